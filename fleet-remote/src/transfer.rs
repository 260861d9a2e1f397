//! File transfer with per-item retry.
//!
//! A batch runs over one file channel. Each item gets its own retry budget;
//! an item that exhausts it is recorded as failed and the batch moves on.
//! Items already transferred are never rolled back.

use crate::session::{FileChannel, RemoteSession, SessionError};
use fleet_core::RetryPolicy;
use fleet_types::{Direction, ModelError, TransferBatch, TransferItem};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// File transfer errors.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Sources and destinations differ in length. Nothing was attempted.
    #[error(transparent)]
    Batch(#[from] ModelError),

    /// The file channel could not be opened.
    #[error("cannot open file channel on {host}: {source}")]
    Channel {
        /// Host address.
        host: String,
        /// Underlying session error.
        #[source]
        source: SessionError,
    },

    /// The root of a tree download could not be listed.
    #[error("cannot list {path} on {host}: {source}")]
    Listing {
        /// Host address.
        host: String,
        /// Remote directory.
        path: String,
        /// Underlying session error.
        #[source]
        source: SessionError,
    },

    /// An item exhausted its retry budget.
    #[error("{direction} of {path} on {host} failed after {attempts} attempts")]
    Exhausted {
        /// Host address.
        host: String,
        /// Which way.
        direction: Direction,
        /// Source path of the item.
        path: String,
        /// Attempts made.
        attempts: u32,
    },
}

/// Result of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    /// The item, with its final attempt count.
    pub item: TransferItem,
    /// Whether it eventually succeeded.
    pub succeeded: bool,
    /// Last error, if it failed.
    pub error: Option<String>,
}

/// Result of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Host address.
    pub host: String,
    /// Which way.
    pub direction: Direction,
    /// One entry per item, in order.
    pub items: Vec<ItemReport>,
}

impl TransferReport {
    fn new(host: &str, direction: Direction) -> Self {
        Self {
            host: host.to_string(),
            direction,
            items: Vec::new(),
        }
    }

    /// True only if every item eventually succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.items.iter().all(|i| i.succeeded)
    }

    /// Total attempts across items.
    pub fn total_attempts(&self) -> u32 {
        self.items.iter().map(|i| i.item.attempts).sum()
    }

    /// Turn the first failed item into an error.
    pub fn into_result(self) -> Result<Self, TransferError> {
        match self.items.iter().find(|i| !i.succeeded) {
            Some(failed) => Err(TransferError::Exhausted {
                host: self.host.clone(),
                direction: self.direction,
                path: failed.item.source.clone(),
                attempts: failed.item.attempts,
            }),
            None => Ok(self),
        }
    }
}

/// Moves files over sessions.
#[derive(Debug, Clone)]
pub struct FileTransfer {
    retry: RetryPolicy,
}

impl Default for FileTransfer {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::TRANSFER,
        }
    }
}

impl FileTransfer {
    /// Transfer service with the default budget (4 attempts, 3 s apart).
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the per-item budget.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Transfer `sources[i]` to `destinations[i]` for every `i`.
    ///
    /// Fails before any attempt when the lists differ in length.
    pub async fn transfer_batch<S, D>(
        &self,
        session: &dyn RemoteSession,
        sources: Vec<S>,
        destinations: Vec<D>,
        direction: Direction,
    ) -> Result<TransferReport, TransferError>
    where
        S: Into<String>,
        D: Into<String>,
    {
        let batch = TransferBatch::new(sources, destinations)?;
        self.run_batch(session, batch, direction).await
    }

    /// Upload a single file.
    pub async fn upload(
        &self,
        session: &dyn RemoteSession,
        local: &str,
        remote: &str,
    ) -> Result<TransferReport, TransferError> {
        self.run_batch(session, TransferBatch::single(local, remote), Direction::Upload)
            .await
    }

    /// Download a single file.
    pub async fn download(
        &self,
        session: &dyn RemoteSession,
        remote: &str,
        local: &str,
    ) -> Result<TransferReport, TransferError> {
        self.run_batch(session, TransferBatch::single(remote, local), Direction::Download)
            .await
    }

    /// Run a prepared batch.
    pub async fn run_batch(
        &self,
        session: &dyn RemoteSession,
        mut batch: TransferBatch,
        direction: Direction,
    ) -> Result<TransferReport, TransferError> {
        let host = session.host();
        let mut channel = open(session).await?;

        let mut report = TransferReport::new(host, direction);
        for item in batch.items_mut() {
            let error = self
                .transfer_item(host, channel.as_mut(), item, direction)
                .await
                .err();
            report.items.push(ItemReport {
                item: item.clone(),
                succeeded: error.is_none(),
                error,
            });
        }
        close(host, channel).await;

        if report.all_succeeded() {
            info!(host = %host, %direction, items = report.items.len(), "Transfer batch complete");
        } else {
            warn!(host = %host, %direction, "Transfer batch finished with failed items");
        }
        Ok(report)
    }

    /// Mirror `remote_dir` into `local_dir/<basename(remote_dir)>`.
    ///
    /// A listing failure below the root skips that subtree. Failing to list
    /// the root itself is an error. An empty tree creates nothing.
    pub async fn download_tree(
        &self,
        session: &dyn RemoteSession,
        remote_dir: &str,
        local_dir: &Path,
    ) -> Result<TransferReport, TransferError> {
        let host = session.host();
        let mut channel = open(session).await?;

        let remote_root = remote_dir.trim_end_matches('/').to_string();
        let base = remote_root.rsplit('/').next().unwrap_or(&remote_root);
        let local_root = local_dir.join(base);

        let mut dirs: Vec<PathBuf> = Vec::new();
        let mut files: Vec<TransferItem> = Vec::new();
        let mut pending = vec![(remote_root.clone(), local_root)];
        while let Some((remote, local)) = pending.pop() {
            let entries = match channel.list_dir(&remote).await {
                Ok(entries) => entries,
                Err(e) if remote == remote_root => {
                    close(host, channel).await;
                    return Err(TransferError::Listing {
                        host: host.to_string(),
                        path: remote_root,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(host = %host, path = %remote, error = %e, "Cannot list remote directory, skipping");
                    continue;
                }
            };
            dirs.push(local.clone());
            for entry in entries {
                let child_remote = format!("{}/{}", remote, entry.name);
                let child_local = local.join(&entry.name);
                if entry.is_dir {
                    pending.push((child_remote, child_local));
                } else {
                    files.push(TransferItem::new(
                        child_remote,
                        child_local.to_string_lossy().into_owned(),
                    ));
                }
            }
        }

        let mut report = TransferReport::new(host, Direction::Download);
        if files.is_empty() {
            info!(host = %host, path = %remote_root, "Remote tree is empty, nothing to download");
            close(host, channel).await;
            return Ok(report);
        }

        for dir in &dirs {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                warn!(path = %dir.display(), error = %e, "Cannot create local directory");
            }
        }

        for item in files.iter_mut() {
            let error = self
                .transfer_item(host, channel.as_mut(), item, Direction::Download)
                .await
                .err();
            report.items.push(ItemReport {
                item: item.clone(),
                succeeded: error.is_none(),
                error,
            });
        }
        close(host, channel).await;

        info!(
            host = %host,
            path = %remote_root,
            files = report.items.len(),
            ok = report.all_succeeded(),
            "Directory download finished"
        );
        Ok(report)
    }

    /// One item with its retry budget. Returns the last error on exhaustion.
    async fn transfer_item(
        &self,
        host: &str,
        channel: &mut dyn FileChannel,
        item: &mut TransferItem,
        direction: Direction,
    ) -> Result<(), String> {
        let mut last_error = String::new();
        while self.retry.allows_another(item.attempts) {
            item.attempts += 1;
            let result = match direction {
                Direction::Upload => {
                    let remote = item.resolved_destination();
                    channel.upload(Path::new(&item.source), &remote).await
                }
                Direction::Download => {
                    let local = local_destination(item).await;
                    if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
                        if let Err(e) = tokio::fs::create_dir_all(parent).await {
                            debug!(path = %parent.display(), error = %e, "Cannot create parent directory");
                        }
                    }
                    channel.download(&item.source, &local).await
                }
            };
            match result {
                Ok(bytes) => {
                    debug!(host = %host, %direction, source = %item.source, bytes, attempt = item.attempts, "Transferred");
                    return Ok(());
                }
                Err(e) => {
                    warn!(host = %host, %direction, source = %item.source, attempt = item.attempts, error = %e, "Transfer attempt failed");
                    last_error = e.to_string();
                    if self.retry.allows_another(item.attempts) && !self.retry.delay.is_zero() {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }
        Err(last_error)
    }
}

/// Local target of a download: directories receive the source file name.
async fn local_destination(item: &TransferItem) -> PathBuf {
    let dest = PathBuf::from(&item.destination);
    let is_dir = tokio::fs::metadata(&dest)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if is_dir {
        dest.join(item.source_file_name())
    } else {
        PathBuf::from(item.resolved_destination())
    }
}

async fn open(session: &dyn RemoteSession) -> Result<Box<dyn FileChannel>, TransferError> {
    session
        .open_files()
        .await
        .map_err(|source| TransferError::Channel {
            host: session.host().to_string(),
            source,
        })
}

async fn close(host: &str, channel: Box<dyn FileChannel>) {
    if let Err(e) = channel.close().await {
        debug!(host = %host, error = %e, "File channel close failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Credentials, MockConnector, ShellConnector};
    use std::sync::Arc;

    async fn session(connector: &MockConnector) -> Arc<dyn RemoteSession> {
        connector
            .connect("h", &Credentials::password("root", "pw"))
            .await
            .unwrap()
    }

    fn service() -> FileTransfer {
        FileTransfer::new().with_retry(RetryPolicy::immediate(4))
    }

    async fn local_file(dir: &Path, name: &str, contents: &[u8]) -> String {
        let path = dir.join(name);
        tokio::fs::write(&path, contents).await.unwrap();
        path.to_string_lossy().into_owned()
    }

    // ===========================================
    // Batch Precondition Tests
    // ===========================================

    #[tokio::test]
    async fn mismatched_batch_makes_zero_attempts() {
        let connector = MockConnector::new();
        let s = session(&connector).await;
        let result = service()
            .transfer_batch(s.as_ref(), vec!["a", "b"], vec!["/x"], Direction::Upload)
            .await;
        assert!(matches!(result, Err(TransferError::Batch(_))));
        assert_eq!(connector.total_transfer_attempts(), 0);
        assert_eq!(connector.channels_opened(), 0);
    }

    // ===========================================
    // Retry Tests
    // ===========================================

    #[tokio::test]
    async fn transient_fault_retries_same_item() {
        let dir = tempfile::tempdir().unwrap();
        let plan = local_file(dir.path(), "plan.jmx", b"plan").await;

        let connector = MockConnector::new();
        connector.fail_transfers("h", "/cases/run/plan.jmx", 2);
        let s = session(&connector).await;

        let report = service()
            .transfer_batch(s.as_ref(), vec![plan], vec!["/cases/run/"], Direction::Upload)
            .await
            .unwrap();
        assert!(report.all_succeeded());
        assert_eq!(report.items[0].item.attempts, 3);
        assert_eq!(connector.remote_file("h", "/cases/run/plan.jmx"), Some(b"plan".to_vec()));
    }

    #[tokio::test]
    async fn failed_item_does_not_stop_batch() {
        let dir = tempfile::tempdir().unwrap();
        let a = local_file(dir.path(), "a.csv", b"a").await;
        let b = local_file(dir.path(), "b.csv", b"b").await;
        let c = local_file(dir.path(), "c.csv", b"c").await;

        let connector = MockConnector::new();
        connector.fail_transfers("h", "/r/b.csv", u32::MAX);
        let s = session(&connector).await;

        let report = service()
            .transfer_batch(
                s.as_ref(),
                vec![a, b, c],
                vec!["/r/", "/r/", "/r/"],
                Direction::Upload,
            )
            .await
            .unwrap();

        assert!(!report.all_succeeded());
        assert_eq!(connector.transfer_attempts("h", "/r/b.csv"), 4);
        assert_eq!(report.items[1].item.attempts, 4);
        assert!(report.items[0].succeeded);
        assert!(report.items[2].succeeded);
        assert!(connector.remote_file("h", "/r/a.csv").is_some());
        assert!(connector.remote_file("h", "/r/c.csv").is_some());
        assert!(matches!(
            report.into_result(),
            Err(TransferError::Exhausted { attempts: 4, .. })
        ));
    }

    // ===========================================
    // Download Tests
    // ===========================================

    #[tokio::test]
    async fn download_into_existing_directory_keeps_name() {
        let dir = tempfile::tempdir().unwrap();
        let connector = MockConnector::new();
        connector.put_file("h", "/cases/run.tar", b"tar");
        let s = session(&connector).await;

        let dest = dir.path().to_string_lossy().into_owned();
        let report = service()
            .download(s.as_ref(), "/cases/run.tar", &dest)
            .await
            .unwrap();
        assert!(report.all_succeeded());
        assert_eq!(
            tokio::fs::read(dir.path().join("run.tar")).await.unwrap(),
            b"tar"
        );
    }

    #[tokio::test]
    async fn download_tree_mirrors_structure() {
        let dir = tempfile::tempdir().unwrap();
        let connector = MockConnector::new();
        connector.put_file("h", "/cases/run/plan.jtl", b"jtl");
        connector.put_file("h", "/cases/run/report/index.html", b"<html/>");
        let s = session(&connector).await;

        let report = service()
            .download_tree(s.as_ref(), "/cases/run/", dir.path())
            .await
            .unwrap();

        assert!(report.all_succeeded());
        assert_eq!(report.items.len(), 2);
        let root = dir.path().join("run");
        assert_eq!(tokio::fs::read(root.join("plan.jtl")).await.unwrap(), b"jtl");
        assert_eq!(
            tokio::fs::read(root.join("report").join("index.html")).await.unwrap(),
            b"<html/>"
        );
    }

    #[tokio::test]
    async fn empty_tree_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let connector = MockConnector::new();
        connector.put_dir("h", "/cases/empty");
        let s = session(&connector).await;

        let report = service()
            .download_tree(s.as_ref(), "/cases/empty", dir.path())
            .await
            .unwrap();
        assert!(report.items.is_empty());
        assert!(!dir.path().join("empty").exists());
    }

    #[tokio::test]
    async fn missing_tree_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let connector = MockConnector::new();
        let s = session(&connector).await;

        let err = service()
            .download_tree(s.as_ref(), "/cases/missing", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Listing { ref path, .. } if path == "/cases/missing"));
        assert!(!dir.path().join("missing").exists());
        assert_eq!(connector.channels_closed(), 1);
    }

    #[tokio::test]
    async fn channel_closed_after_batch() {
        let connector = MockConnector::new();
        connector.put_file("h", "/f", b"x");
        let s = session(&connector).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = format!("{}/", dir.path().display());
        service().download(s.as_ref(), "/f", &dest).await.unwrap();
        assert_eq!(connector.channels_opened(), 1);
        assert_eq!(connector.channels_closed(), 1);
    }
}
