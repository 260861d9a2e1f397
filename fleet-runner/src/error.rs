//! Error types for the runner.

use crate::config::ConfigError;
use crate::paths::PathResolutionError;
use fleet_cloud::ProvisionError;
use fleet_core::TopologyError;
use fleet_remote::{ExecError, TransferError};
use thiserror::Error;

/// Errors that abort a run.
///
/// Per-slave failures never show up here; they are recorded in the phase
/// reports of [`RunReport`](crate::RunReport).
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration file could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Configuration is loadable but unusable.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A local path could not be resolved.
    #[error(transparent)]
    Path(#[from] PathResolutionError),

    /// Provisioning failed or timed out.
    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    /// No master could be elected.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// No host could be reached.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// A channel failed on the master's path.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// A transfer failed on the master's path.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// A remote command on the master's path exited non-zero.
    #[error("command on {host} failed: {diagnostic}")]
    Execution {
        /// Host the command ran on.
        host: String,
        /// Exit status and stderr.
        diagnostic: String,
    },

    /// Local I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunError>;
