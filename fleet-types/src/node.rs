//! Compute node lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BatchId, InstanceId, ModelError};

/// Lifecycle state of a provisioned compute node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    /// Creation requested, not yet observed by a status poll.
    Requested,
    /// Observed by the platform but not yet running.
    Provisioning,
    /// Confirmed running by a status poll.
    Running,
    /// Stopped or otherwise not reachable.
    Unreachable,
    /// Torn down.
    Released,
}

impl NodeState {
    /// Map a platform status string onto a lifecycle state.
    ///
    /// Unknown statuses are treated as still provisioning.
    pub fn from_platform(status: &str) -> Self {
        match status {
            "Running" => Self::Running,
            "Stopping" | "Stopped" => Self::Unreachable,
            _ => Self::Provisioning,
        }
    }

    /// Whether `self -> to` is a legal transition.
    pub fn can_transition_to(self, to: NodeState) -> bool {
        use NodeState::*;
        if self == to {
            return self != Released;
        }
        match (self, to) {
            (Released, _) => false,
            (_, Released) => true,
            (Requested, Provisioning | Running | Unreachable) => true,
            (Provisioning, Running | Unreachable) => true,
            (Running, Unreachable) => true,
            (Unreachable, Provisioning | Running) => true,
            _ => false,
        }
    }
}

/// One ephemeral compute node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeNode {
    /// Platform identifier.
    pub id: InstanceId,
    /// Primary network address, known once a poll reports it.
    pub address: Option<String>,
    /// Current lifecycle state.
    pub state: NodeState,
    /// Platform-side auto-release time.
    pub expires_at: DateTime<Utc>,
}

impl ComputeNode {
    /// A freshly requested node.
    pub fn requested(id: InstanceId, expires_at: DateTime<Utc>) -> Self {
        Self {
            id,
            address: None,
            state: NodeState::Requested,
            expires_at,
        }
    }

    /// Move to a new state, rejecting illegal transitions.
    pub fn transition(&mut self, to: NodeState) -> Result<(), ModelError> {
        if !self.state.can_transition_to(to) {
            return Err(ModelError::InvalidTransition {
                instance: self.id.to_string(),
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Record a poll observation: new state plus the reported address.
    pub fn observe(&mut self, state: NodeState, address: Option<String>) -> Result<(), ModelError> {
        self.transition(state)?;
        if address.is_some() {
            self.address = address;
        }
        Ok(())
    }

    /// Check if the node is confirmed running.
    pub fn is_running(&self) -> bool {
        self.state == NodeState::Running
    }
}

/// The nodes created by one provisioning request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeBatch {
    /// Local correlation id.
    pub id: BatchId,
    /// Nodes in creation order.
    pub nodes: Vec<ComputeNode>,
    /// Auto-release time shared by every node.
    pub expires_at: DateTime<Utc>,
}

impl NodeBatch {
    /// Build a batch from freshly created instance ids.
    pub fn new(instances: Vec<InstanceId>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: BatchId::new(),
            nodes: instances
                .into_iter()
                .map(|id| ComputeNode::requested(id, expires_at))
                .collect(),
            expires_at,
        }
    }

    /// Instance ids in creation order.
    pub fn instance_ids(&self) -> Vec<InstanceId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Find a node by id.
    pub fn node_mut(&mut self, id: &InstanceId) -> Option<&mut ComputeNode> {
        self.nodes.iter_mut().find(|n| &n.id == id)
    }

    /// Number of nodes in the batch.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check if every node is running.
    pub fn all_running(&self) -> bool {
        !self.nodes.is_empty() && self.nodes.iter().all(ComputeNode::is_running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> ComputeNode {
        ComputeNode::requested(InstanceId::new("i-1"), Utc::now())
    }

    #[test]
    fn platform_status_mapping() {
        assert_eq!(NodeState::from_platform("Running"), NodeState::Running);
        assert_eq!(NodeState::from_platform("Pending"), NodeState::Provisioning);
        assert_eq!(NodeState::from_platform("Starting"), NodeState::Provisioning);
        assert_eq!(NodeState::from_platform("Stopped"), NodeState::Unreachable);
    }

    #[test]
    fn requested_to_running_records_address() {
        let mut n = node();
        n.observe(NodeState::Provisioning, None).unwrap();
        n.observe(NodeState::Running, Some("10.0.0.1".into())).unwrap();
        assert!(n.is_running());
        assert_eq!(n.address.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn repeated_poll_state_is_allowed() {
        let mut n = node();
        n.transition(NodeState::Provisioning).unwrap();
        n.transition(NodeState::Provisioning).unwrap();
        assert_eq!(n.state, NodeState::Provisioning);
    }

    #[test]
    fn released_is_terminal() {
        let mut n = node();
        n.transition(NodeState::Released).unwrap();
        let err = n.transition(NodeState::Running).unwrap_err();
        assert!(matches!(err, ModelError::InvalidTransition { .. }));
        assert!(n.transition(NodeState::Released).is_err());
    }

    #[test]
    fn running_cannot_go_back_to_requested() {
        let mut n = node();
        n.transition(NodeState::Running).unwrap();
        assert!(n.transition(NodeState::Requested).is_err());
    }

    #[test]
    fn batch_all_running() {
        let mut batch = NodeBatch::new(vec!["i-1".into(), "i-2".into()], Utc::now());
        assert_eq!(batch.len(), 2);
        assert!(!batch.all_running());

        for id in batch.instance_ids() {
            batch
                .node_mut(&id)
                .unwrap()
                .transition(NodeState::Running)
                .unwrap();
        }
        assert!(batch.all_running());
    }

    #[test]
    fn empty_batch_is_never_running() {
        let batch = NodeBatch::new(vec![], Utc::now());
        assert!(batch.is_empty());
        assert!(!batch.all_running());
    }
}
