//! Error types for the loadfleet data model.

use thiserror::Error;

use crate::NodeState;

/// Violations of data-model invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Transfer batch source and destination lists differ in length.
    #[error("transfer batch mismatch: {sources} sources vs {destinations} destinations")]
    MismatchedBatch {
        /// Number of source paths.
        sources: usize,
        /// Number of destination paths.
        destinations: usize,
    },

    /// A node lifecycle transition that is not allowed.
    #[error("invalid node transition for {instance}: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Instance the transition was attempted on.
        instance: String,
        /// Current state.
        from: NodeState,
        /// Requested state.
        to: NodeState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ModelError::MismatchedBatch {
            sources: 2,
            destinations: 1,
        };
        assert_eq!(
            err.to_string(),
            "transfer batch mismatch: 2 sources vs 1 destinations"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ModelError>();
    }
}
