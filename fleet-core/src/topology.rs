//! Master election over a set of ready hosts.
//!
//! The topology is derived, never mutated: every run elects one from the
//! hosts that actually have a session, so the master is always reachable.

use thiserror::Error;

/// Errors from topology election.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// No ready hosts to elect from.
    #[error("cannot elect a master from an empty host set")]
    Empty,
}

/// One master plus zero or more slaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    master: String,
    slaves: Vec<String>,
}

impl Topology {
    /// Elect a master from `ready`.
    ///
    /// The preferred host wins if it is in the ready set; otherwise the first
    /// ready host is master. Duplicate addresses collapse to one entry.
    pub fn elect(ready: &[String], preferred: Option<&str>) -> Result<Self, TopologyError> {
        let first = ready.first().ok_or(TopologyError::Empty)?;
        let master = preferred
            .and_then(|p| ready.iter().find(|h| h.as_str() == p))
            .unwrap_or(first)
            .clone();

        let mut slaves: Vec<String> = Vec::with_capacity(ready.len().saturating_sub(1));
        for host in ready {
            if *host != master && !slaves.contains(host) {
                slaves.push(host.clone());
            }
        }

        Ok(Self { master, slaves })
    }

    /// The master's address.
    pub fn master(&self) -> &str {
        &self.master
    }

    /// Slave addresses in ready-set order.
    pub fn slaves(&self) -> &[String] {
        &self.slaves
    }

    /// Total number of hosts.
    pub fn len(&self) -> usize {
        1 + self.slaves.len()
    }

    /// A topology always has a master.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Peer list handed to the master: every slave with the control port.
    pub fn peer_list(&self, control_port: u16) -> Vec<String> {
        self.slaves
            .iter()
            .map(|h| format!("{}:{}", h, control_port))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_set_fails() {
        assert_eq!(Topology::elect(&[], None), Err(TopologyError::Empty));
    }

    #[test]
    fn first_host_is_default_master() {
        let t = Topology::elect(&hosts(&["A", "B", "C"]), None).unwrap();
        assert_eq!(t.master(), "A");
        assert_eq!(t.slaves(), &["B".to_string(), "C".to_string()]);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn preferred_master_honored_when_ready() {
        let t = Topology::elect(&hosts(&["A", "B", "C"]), Some("B")).unwrap();
        assert_eq!(t.master(), "B");
        assert_eq!(t.slaves(), &["A".to_string(), "C".to_string()]);
    }

    #[test]
    fn preferred_master_missing_falls_back_to_first() {
        let t = Topology::elect(&hosts(&["A", "B"]), Some("Z")).unwrap();
        assert_eq!(t.master(), "A");
    }

    #[test]
    fn peer_list_excludes_master() {
        let t = Topology::elect(&hosts(&["A", "B", "C"]), Some("A")).unwrap();
        let peers = t.peer_list(1099);
        assert_eq!(peers, vec!["B:1099".to_string(), "C:1099".to_string()]);
        assert!(!peers.iter().any(|p| p.starts_with("A:")));
    }

    #[test]
    fn single_host_has_no_peers() {
        let t = Topology::elect(&hosts(&["A"]), None).unwrap();
        assert!(t.slaves().is_empty());
        assert!(t.peer_list(1099).is_empty());
    }

    #[test]
    fn duplicates_collapse() {
        let t = Topology::elect(&hosts(&["A", "B", "A", "B"]), None).unwrap();
        assert_eq!(t.slaves(), &["B".to_string()]);
    }
}
