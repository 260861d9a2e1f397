//! Mock provider for testing.
//!
//! Instances report `Provisioning` until a configured number of status polls
//! have been made, then `Running` with a deterministic address.

use crate::provider::{CloudProvider, InstanceStatus};
use crate::{ProvisionError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_types::{InstanceId, NodeState};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Mock provider for testing.
#[derive(Debug)]
pub struct MockProvider {
    inner: Arc<Mutex<MockProviderInner>>,
}

#[derive(Debug)]
struct MockProviderInner {
    limit: usize,
    next_id: u32,
    instances: Vec<InstanceId>,
    ready_after: u32,
    polls: u32,
    hold_back: usize,
    failing_polls: u32,
    fail_next_provision: Option<String>,
    release_failures: HashSet<InstanceId>,
    released: Vec<InstanceId>,
    provision_calls: Vec<(usize, DateTime<Utc>)>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockProviderInner {
                limit: 50,
                next_id: 1,
                instances: Vec::new(),
                ready_after: 1,
                polls: 0,
                hold_back: 0,
                failing_polls: 0,
                fail_next_provision: None,
                release_failures: HashSet::new(),
                released: Vec::new(),
                provision_calls: Vec::new(),
            })),
        }
    }
}

impl MockProvider {
    /// Create a provider whose instances run on the first poll.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-call instance limit.
    pub fn set_limit(&self, limit: usize) {
        self.inner.lock().unwrap().limit = limit;
    }

    /// Instances report running from the `polls`-th status poll on.
    pub fn set_ready_after(&self, polls: u32) {
        self.inner.lock().unwrap().ready_after = polls;
    }

    /// The last `count` instances never leave provisioning.
    pub fn hold_back(&self, count: usize) {
        self.inner.lock().unwrap().hold_back = count;
    }

    /// The next `count` status polls fail.
    pub fn fail_polls(&self, count: u32) {
        self.inner.lock().unwrap().failing_polls = count;
    }

    /// Cause the next provision call to fail with the given error.
    pub fn fail_next_provision(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_provision = Some(error.to_string());
    }

    /// Releasing `id` fails.
    pub fn fail_release(&self, id: &InstanceId) {
        self.inner.lock().unwrap().release_failures.insert(id.clone());
    }

    /// Status polls made so far.
    pub fn polls(&self) -> u32 {
        self.inner.lock().unwrap().polls
    }

    /// Instances released so far.
    pub fn released(&self) -> Vec<InstanceId> {
        self.inner.lock().unwrap().released.clone()
    }

    /// (count, expiry) of every provision call.
    pub fn provision_calls(&self) -> Vec<(usize, DateTime<Utc>)> {
        self.inner.lock().unwrap().provision_calls.clone()
    }

    /// Address assigned to the `index`-th instance (zero-based).
    pub fn address_of(index: usize) -> String {
        format!("10.0.0.{}", index + 1)
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl CloudProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn max_instances_per_call(&self) -> usize {
        self.inner.lock().unwrap().limit
    }

    async fn provision_instances(
        &self,
        count: usize,
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<InstanceId>> {
        let mut inner = self.inner.lock().unwrap();
        inner.provision_calls.push((count, expires_at));
        if let Some(error) = inner.fail_next_provision.take() {
            return Err(ProvisionError::Api {
                action: "RunInstances".into(),
                reason: error,
            });
        }
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let id = InstanceId::new(format!("i-mock{}", inner.next_id));
            inner.next_id += 1;
            inner.instances.push(id.clone());
            ids.push(id);
        }
        Ok(ids)
    }

    async fn query_status(&self, ids: &[InstanceId]) -> Result<Vec<InstanceStatus>> {
        let mut inner = self.inner.lock().unwrap();
        inner.polls += 1;
        if inner.failing_polls > 0 {
            inner.failing_polls -= 1;
            return Err(ProvisionError::Api {
                action: "DescribeInstances".into(),
                reason: "throttled".into(),
            });
        }

        let ready = inner.polls >= inner.ready_after;
        let held_from = inner.instances.len().saturating_sub(inner.hold_back);
        Ok(inner
            .instances
            .iter()
            .enumerate()
            .filter(|(_, id)| ids.contains(*id))
            .map(|(index, id)| {
                if ready && index < held_from {
                    InstanceStatus {
                        id: id.clone(),
                        state: NodeState::Running,
                        address: Some(Self::address_of(index)),
                    }
                } else {
                    InstanceStatus {
                        id: id.clone(),
                        state: NodeState::Provisioning,
                        address: None,
                    }
                }
            })
            .collect())
    }

    async fn release_instance(&self, id: &InstanceId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.release_failures.contains(id) {
            return Err(ProvisionError::Api {
                action: "DeleteInstance".into(),
                reason: "instance locked".into(),
            });
        }
        inner.released.push(id.clone());
        Ok(())
    }
}
