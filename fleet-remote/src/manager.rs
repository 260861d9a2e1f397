//! Session manager: connect hosts with bounded retry.
//!
//! A host that cannot be reached within the retry budget yields no session
//! instead of an error. The caller decides whether one missing host matters.

use crate::session::{Credentials, RemoteSession, ShellConnector};
use fleet_core::RetryPolicy;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Connects hosts through a [`ShellConnector`].
pub struct SessionManager {
    connector: Arc<dyn ShellConnector>,
    retry: RetryPolicy,
}

impl SessionManager {
    /// Manager with the default connect budget (3 attempts, 5 s apart).
    pub fn new(connector: Arc<dyn ShellConnector>) -> Self {
        Self {
            connector,
            retry: RetryPolicy::CONNECT,
        }
    }

    /// Override the connect budget.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Connect to `host`, retrying on any failure including rejected credentials.
    pub async fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> Option<Arc<dyn RemoteSession>> {
        let mut attempt = 0;
        while self.retry.allows_another(attempt) {
            attempt += 1;
            match self.connector.connect(host, credentials).await {
                Ok(session) => {
                    info!(host = %host, attempt, "Connected");
                    return Some(session);
                }
                Err(e) => {
                    warn!(host = %host, attempt, error = %e, "Connect attempt failed");
                    if self.retry.allows_another(attempt) && !self.retry.delay.is_zero() {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }
        warn!(host = %host, attempts = attempt, "Host unreachable, giving up");
        None
    }

    /// Connect every host independently.
    ///
    /// Duplicate addresses are connected once.
    pub async fn connect_all(&self, hosts: &[String], credentials: &Credentials) -> SessionSet {
        let mut unique: Vec<&String> = Vec::with_capacity(hosts.len());
        for host in hosts {
            if !unique.contains(&host) {
                unique.push(host);
            }
        }

        let results = join_all(
            unique
                .iter()
                .map(|host| async move { (host.to_string(), self.connect(host, credentials).await) }),
        )
        .await;

        let mut set = SessionSet::default();
        for (host, session) in results {
            match session {
                Some(session) => set.sessions.push((host, session)),
                None => set.unreachable.push(host),
            }
        }
        info!(
            connected = set.sessions.len(),
            unreachable = set.unreachable.len(),
            "Sessions established"
        );
        set
    }
}

/// Sessions keyed by host address, in input order.
#[derive(Default)]
pub struct SessionSet {
    sessions: Vec<(String, Arc<dyn RemoteSession>)>,
    unreachable: Vec<String>,
}

impl SessionSet {
    /// Session for `host`.
    pub fn get(&self, host: &str) -> Option<&Arc<dyn RemoteSession>> {
        self.sessions
            .iter()
            .find(|(h, _)| h == host)
            .map(|(_, s)| s)
    }

    /// Connected hosts in input order.
    pub fn hosts(&self) -> Vec<String> {
        self.sessions.iter().map(|(h, _)| h.clone()).collect()
    }

    /// (host, session) pairs in input order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn RemoteSession>)> {
        self.sessions.iter().map(|(h, s)| (h.as_str(), s))
    }

    /// Hosts that could not be connected.
    pub fn unreachable(&self) -> &[String] {
        &self.unreachable
    }

    /// Number of connected hosts.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if no host connected.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close every session. Returns how many closed cleanly.
    pub async fn close_all(self) -> usize {
        let mut closed = 0;
        for (host, session) in self.sessions {
            match session.close().await {
                Ok(()) => closed += 1,
                Err(e) => warn!(host = %host, error = %e, "Session close failed"),
            }
        }
        closed
    }
}

impl std::fmt::Debug for SessionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSet")
            .field("hosts", &self.hosts())
            .field("unreachable", &self.unreachable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockConnector;

    fn manager(connector: &MockConnector) -> SessionManager {
        SessionManager::new(Arc::new(connector.clone())).with_retry(RetryPolicy::immediate(3))
    }

    fn creds() -> Credentials {
        Credentials::password("root", "secret")
    }

    fn hosts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // ===========================================
    // Single Host Tests
    // ===========================================

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let connector = MockConnector::new();
        connector.fail_connects("h", 2);
        let session = manager(&connector).connect("h", &creds()).await;
        assert!(session.is_some());
        assert_eq!(connector.connect_attempts("h"), 3);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let connector = MockConnector::new();
        connector.unreachable("h");
        let session = manager(&connector).connect("h", &creds()).await;
        assert!(session.is_none());
        assert_eq!(connector.connect_attempts("h"), 3);
    }

    #[tokio::test]
    async fn auth_rejection_counts_as_attempt() {
        let connector = MockConnector::new();
        connector.reject_auth("h");
        assert!(manager(&connector).connect("h", &creds()).await.is_none());
        assert_eq!(connector.connect_attempts("h"), 3);
    }

    // ===========================================
    // Session Set Tests
    // ===========================================

    #[tokio::test]
    async fn connect_all_keys_by_address() {
        let connector = MockConnector::new();
        connector.unreachable("B");
        let set = manager(&connector)
            .connect_all(&hosts(&["A", "B", "C"]), &creds())
            .await;

        assert_eq!(set.hosts(), hosts(&["A", "C"]));
        assert_eq!(set.unreachable(), &["B".to_string()]);
        assert_eq!(set.get("C").unwrap().host(), "C");
        assert!(set.get("B").is_none());
    }

    #[tokio::test]
    async fn duplicates_connect_once() {
        let connector = MockConnector::new();
        let set = manager(&connector)
            .connect_all(&hosts(&["A", "A"]), &creds())
            .await;
        assert_eq!(set.len(), 1);
        assert_eq!(connector.connect_attempts("A"), 1);
    }

    #[tokio::test]
    async fn close_all_closes_each_once() {
        let connector = MockConnector::new();
        let set = manager(&connector)
            .connect_all(&hosts(&["A", "B"]), &creds())
            .await;
        assert_eq!(set.close_all().await, 2);
        assert_eq!(connector.session_closes("A"), 1);
        assert_eq!(connector.session_closes("B"), 1);
    }
}
