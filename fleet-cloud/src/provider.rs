//! Cloud provider capability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_types::{InstanceId, NodeState};

use crate::Result;

/// One instance as reported by a status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceStatus {
    /// Platform identifier.
    pub id: InstanceId,
    /// Reported lifecycle state.
    pub state: NodeState,
    /// Primary address, if assigned.
    pub address: Option<String>,
}

/// What a cloud platform must offer to host a fleet.
///
/// Each platform implements this directly; nothing dispatches on a provider
/// name outside of configuration.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Most instances one create call may request.
    fn max_instances_per_call(&self) -> usize;

    /// Create `count` instances that the platform releases at `expires_at`.
    async fn provision_instances(
        &self,
        count: usize,
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<InstanceId>>;

    /// Current status of `ids`. Unknown ids are omitted.
    async fn query_status(&self, ids: &[InstanceId]) -> Result<Vec<InstanceStatus>>;

    /// Force-release one instance.
    async fn release_instance(&self, id: &InstanceId) -> Result<()>;
}
