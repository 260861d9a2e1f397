//! Role assignment within a fleet.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The role a node plays in a distributed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Drives the run and produces the aggregated artifact.
    Master,
    /// Runs a listening agent controlled by the master.
    Slave,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Slave => write!(f, "slave"),
        }
    }
}
