//! File transfer units.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ModelError;

/// Which way a transfer moves data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Local source, remote destination.
    Upload,
    /// Remote source, local destination.
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => write!(f, "upload"),
            Direction::Download => write!(f, "download"),
        }
    }
}

/// One (source, destination) pair plus the attempts spent on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    /// Source path (local for uploads, remote for downloads).
    pub source: String,
    /// Destination path. A trailing `/` names a directory.
    pub destination: String,
    /// Attempts made so far.
    pub attempts: u32,
}

impl TransferItem {
    /// A fresh item with no attempts.
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            attempts: 0,
        }
    }

    /// Final file name of the source path.
    pub fn source_file_name(&self) -> &str {
        file_name(&self.source)
    }

    /// Destination with the source file name appended when it names a directory.
    pub fn resolved_destination(&self) -> String {
        if self.destination.ends_with('/') {
            format!("{}{}", self.destination, self.source_file_name())
        } else {
            self.destination.clone()
        }
    }
}

/// An ordered set of transfer items with equal-length sources and destinations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransferBatch {
    items: Vec<TransferItem>,
}

impl TransferBatch {
    /// Pair sources with destinations.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MismatchedBatch`] when the lists differ in length.
    pub fn new<S, D>(sources: Vec<S>, destinations: Vec<D>) -> Result<Self, ModelError>
    where
        S: Into<String>,
        D: Into<String>,
    {
        if sources.len() != destinations.len() {
            return Err(ModelError::MismatchedBatch {
                sources: sources.len(),
                destinations: destinations.len(),
            });
        }
        let items = sources
            .into_iter()
            .zip(destinations)
            .map(|(s, d)| TransferItem::new(s, d))
            .collect();
        Ok(Self { items })
    }

    /// A batch holding a single item.
    pub fn single(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            items: vec![TransferItem::new(source, destination)],
        }
    }

    /// Items in order.
    pub fn items(&self) -> &[TransferItem] {
        &self.items
    }

    /// Mutable items in order.
    pub fn items_mut(&mut self) -> &mut [TransferItem] {
        &mut self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_lengths_rejected() {
        let err = TransferBatch::new(vec!["a", "b"], vec!["x"]).unwrap_err();
        assert_eq!(
            err,
            ModelError::MismatchedBatch {
                sources: 2,
                destinations: 1
            }
        );
    }

    #[test]
    fn items_start_with_zero_attempts() {
        let batch = TransferBatch::new(vec!["a", "b"], vec!["x", "y"]).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.items().iter().all(|i| i.attempts == 0));
        assert_eq!(batch.items()[1].source, "b");
        assert_eq!(batch.items()[1].destination, "y");
    }

    #[test]
    fn directory_destination_gets_file_name() {
        let item = TransferItem::new("/home/me/plans/load.jmx", "/usr/local/cases/run/");
        assert_eq!(item.resolved_destination(), "/usr/local/cases/run/load.jmx");
    }

    #[test]
    fn file_destination_is_kept() {
        let item = TransferItem::new("load.jmx", "/tmp/renamed.jmx");
        assert_eq!(item.resolved_destination(), "/tmp/renamed.jmx");
        assert_eq!(item.source_file_name(), "load.jmx");
    }
}
