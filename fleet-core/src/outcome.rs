//! Per-host results of fan-out phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A concurrent phase of an orchestrated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Remote run directory creation.
    Prepare,
    /// Script and resource upload.
    Upload,
    /// Tool install and role configuration.
    Configure,
    /// Background agent start on slaves.
    AgentStart,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Prepare => "prepare",
            Phase::Upload => "upload",
            Phase::Configure => "configure",
            Phase::AgentStart => "agent-start",
        };
        f.write_str(name)
    }
}

/// How one host fared in a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostStatus {
    /// Completed; exit status when one was observed.
    Succeeded {
        /// Remote exit status.
        exit_status: Option<u32>,
    },
    /// Failed for `reason`.
    Failed {
        /// Human-readable cause.
        reason: String,
    },
}

/// Result of one host in one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostOutcome {
    /// Host address.
    pub host: String,
    /// What happened.
    pub status: HostStatus,
}

impl HostOutcome {
    /// A success.
    pub fn succeeded(host: impl Into<String>, exit_status: Option<u32>) -> Self {
        Self {
            host: host.into(),
            status: HostStatus::Succeeded { exit_status },
        }
    }

    /// A failure.
    pub fn failed(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            status: HostStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    /// Check if this outcome is a success.
    pub fn is_success(&self) -> bool {
        matches!(self.status, HostStatus::Succeeded { .. })
    }
}

/// Collected outcomes of one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    /// Which phase.
    pub phase: Phase,
    /// One entry per host that was dispatched.
    pub outcomes: Vec<HostOutcome>,
}

impl PhaseReport {
    /// Empty report for `phase`.
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            outcomes: Vec::new(),
        }
    }

    /// Add an outcome.
    pub fn record(&mut self, outcome: HostOutcome) {
        self.outcomes.push(outcome);
    }

    /// Hosts that succeeded.
    pub fn succeeded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.host.as_str())
            .collect()
    }

    /// Outcomes that failed.
    pub fn failed(&self) -> Vec<&HostOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success()).collect()
    }

    /// Check if every dispatched host succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(HostOutcome::is_success)
    }

    /// Outcome for `host`.
    pub fn outcome_for(&self, host: &str) -> Option<&HostOutcome> {
        self.outcomes.iter().find(|o| o.host == host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_partitions_hosts() {
        let mut report = PhaseReport::new(Phase::Configure);
        report.record(HostOutcome::succeeded("A", Some(0)));
        report.record(HostOutcome::failed("B", "exit status 2"));
        report.record(HostOutcome::succeeded("C", None));

        assert_eq!(report.succeeded(), vec!["A", "C"]);
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.failed()[0].host, "B");
        assert!(!report.all_succeeded());
        assert!(report.outcome_for("C").unwrap().is_success());
    }

    #[test]
    fn empty_report_succeeds() {
        assert!(PhaseReport::new(Phase::Upload).all_succeeded());
    }

    #[test]
    fn phase_display() {
        assert_eq!(Phase::AgentStart.to_string(), "agent-start");
    }
}
