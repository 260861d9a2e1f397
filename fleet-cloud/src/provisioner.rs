//! Fleet provisioner: request nodes, wait until all run, release.

use crate::provider::CloudProvider;
use crate::{ProvisionError, Result};
use chrono::{Duration as ChronoDuration, Utc};
use fleet_core::ReadinessPolicy;
use fleet_types::{InstanceId, NodeBatch, NodeState};
use std::sync::Arc;
use tracing::{info, warn};

/// Drives a [`CloudProvider`] through a fleet's lifecycle.
pub struct FleetProvisioner {
    provider: Arc<dyn CloudProvider>,
    readiness: ReadinessPolicy,
}

impl FleetProvisioner {
    /// Provisioner with the default readiness budget.
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self {
            provider,
            readiness: ReadinessPolicy::default(),
        }
    }

    /// Override the readiness budget.
    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    /// Request `count` nodes that the platform releases after `expire_hours`.
    ///
    /// The limit check happens before any platform call.
    pub async fn request_nodes(&self, count: usize, expire_hours: u32) -> Result<NodeBatch> {
        if count == 0 {
            return Err(ProvisionError::ZeroCount);
        }
        let limit = self.provider.max_instances_per_call();
        if count > limit {
            return Err(ProvisionError::CapacityExceeded {
                requested: count,
                limit,
            });
        }

        let expires_at = Utc::now() + ChronoDuration::hours(i64::from(expire_hours));
        let ids = self.provider.provision_instances(count, expires_at).await?;
        let mut batch = NodeBatch::new(ids, expires_at);
        for node in &mut batch.nodes {
            node.state = NodeState::Provisioning;
        }
        info!(
            batch = %batch.id,
            provider = self.provider.name(),
            count = batch.len(),
            expires_at = %expires_at,
            "Nodes requested"
        );
        Ok(batch)
    }

    /// Poll until every node in `batch` runs; return their addresses in batch order.
    ///
    /// Never returns a partial list. A failed poll counts as not ready.
    pub async fn await_ready(&self, batch: &mut NodeBatch) -> Result<Vec<String>> {
        let attempts = self.readiness.attempts_for(batch.len());
        let ids = batch.instance_ids();

        if !self.readiness.warmup.is_zero() {
            info!(batch = %batch.id, warmup = ?self.readiness.warmup, "Waiting for nodes to boot");
            tokio::time::sleep(self.readiness.warmup).await;
        }

        for attempt in 1..=attempts {
            match self.provider.query_status(&ids).await {
                Ok(statuses) => {
                    let mut addresses: Vec<String> = Vec::with_capacity(ids.len());
                    for id in &ids {
                        let status = statuses.iter().find(|s| &s.id == id);
                        match status {
                            Some(s) if s.state == NodeState::Running => {
                                if let Some(address) = &s.address {
                                    addresses.push(address.clone());
                                }
                            }
                            _ => {}
                        }
                    }

                    if addresses.len() == ids.len() {
                        for status in &statuses {
                            if let Some(node) = batch.node_mut(&status.id) {
                                if let Err(e) = node.observe(status.state, status.address.clone()) {
                                    warn!(error = %e, "Ignoring node state update");
                                }
                            }
                        }
                        info!(batch = %batch.id, attempt, nodes = addresses.len(), "All nodes running");
                        return Ok(addresses);
                    }
                    info!(
                        batch = %batch.id,
                        attempt,
                        running = addresses.len(),
                        total = ids.len(),
                        "Nodes not ready yet"
                    );
                }
                Err(e) => {
                    warn!(batch = %batch.id, attempt, error = %e, "Status poll failed");
                }
            }

            if attempt < attempts && !self.readiness.interval.is_zero() {
                tokio::time::sleep(self.readiness.interval).await;
            }
        }

        Err(ProvisionError::Timeout { attempts })
    }

    /// Release every node in `batch`, best effort. Returns how many were released.
    pub async fn release(&self, batch: &mut NodeBatch) -> usize {
        let mut released = 0;
        for node in &mut batch.nodes {
            if node.state == NodeState::Released {
                continue;
            }
            match self.provider.release_instance(&node.id).await {
                Ok(()) => {
                    if let Err(e) = node.transition(NodeState::Released) {
                        warn!(error = %e, "Ignoring node state update");
                    }
                    released += 1;
                }
                Err(e) => warn!(instance = %node.id, error = %e, "Release failed"),
            }
        }
        info!(batch = %batch.id, released, total = batch.len(), "Batch released");
        released
    }

    /// Release instances by id, best effort. Returns how many were released.
    pub async fn release_ids(&self, ids: &[InstanceId]) -> usize {
        let mut released = 0;
        for id in ids {
            match self.provider.release_instance(id).await {
                Ok(()) => released += 1,
                Err(e) => warn!(instance = %id, error = %e, "Release failed"),
            }
        }
        released
    }
}
