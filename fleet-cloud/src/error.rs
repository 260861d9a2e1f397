//! Error types for fleet provisioning.

use thiserror::Error;

/// Provisioning errors.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A node count of zero was requested.
    #[error("node count must be at least 1")]
    ZeroCount,

    /// More nodes requested than the platform creates per call.
    #[error("requested {requested} nodes but the platform allows at most {limit} per call")]
    CapacityExceeded {
        /// Requested count.
        requested: usize,
        /// Per-call limit.
        limit: usize,
    },

    /// The platform API rejected or failed a call.
    #[error("{action} failed: {reason}")]
    Api {
        /// API action name.
        action: String,
        /// Platform error code and message, or transport failure.
        reason: String,
    },

    /// Not every node reported running within the poll budget.
    #[error("nodes not ready after {attempts} status polls")]
    Timeout {
        /// Polls made.
        attempts: u32,
    },

    /// Region name not present in the catalog.
    #[error("unknown region: {0}")]
    UnknownRegion(String),

    /// Provider settings are incomplete.
    #[error("provider configuration error: {0}")]
    Config(String),
}

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_message() {
        let err = ProvisionError::CapacityExceeded {
            requested: 60,
            limit: 50,
        };
        assert_eq!(
            err.to_string(),
            "requested 60 nodes but the platform allows at most 50 per call"
        );
    }

    #[test]
    fn timeout_message() {
        assert_eq!(
            ProvisionError::Timeout { attempts: 8 }.to_string(),
            "nodes not ready after 8 status polls"
        );
    }
}
