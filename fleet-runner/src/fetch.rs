//! Fetch a remote directory outside of a run.

use crate::config::Config;
use crate::error::{Result, RunError};
use fleet_core::archive_directory_script;
use fleet_remote::{CommandExecutor, FileTransfer, RemoteSession, SessionManager, ShellConnector};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// How a remote directory is brought back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Tar the directory next to itself, download the single archive.
    #[default]
    Archive,
    /// Walk the tree and download file by file.
    Mirror,
}

/// Bring `remote_dir` on `host` into `local_dir`.
///
/// Returns the local archive path ([`FetchMode::Archive`]) or the mirrored
/// directory ([`FetchMode::Mirror`]).
pub async fn fetch_remote(
    config: &Config,
    connector: Arc<dyn ShellConnector>,
    host: &str,
    remote_dir: &str,
    local_dir: &Path,
    mode: FetchMode,
) -> Result<PathBuf> {
    let manager = SessionManager::new(connector).with_retry(config.ssh.connect_retry());
    let session = manager
        .connect(host, &config.ssh.credentials())
        .await
        .ok_or_else(|| RunError::Connectivity(format!("{} is unreachable", host)))?;

    let transfer = FileTransfer::new().with_retry(config.timing.transfer_retry());
    let result = fetch_over(session.as_ref(), &transfer, remote_dir, local_dir, mode).await;
    if let Err(e) = session.close().await {
        debug!(host = %host, error = %e, "Session close failed");
    }
    result
}

async fn fetch_over(
    session: &dyn RemoteSession,
    transfer: &FileTransfer,
    remote_dir: &str,
    local_dir: &Path,
    mode: FetchMode,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(local_dir).await?;
    let remote_dir = remote_dir.trim_end_matches('/');
    let name = remote_dir.rsplit('/').next().unwrap_or(remote_dir);
    if name.is_empty() {
        return Err(RunError::Configuration(format!(
            "cannot fetch remote directory {:?}",
            remote_dir
        )));
    }

    match mode {
        FetchMode::Mirror => {
            let report = transfer
                .download_tree(session, remote_dir, local_dir)
                .await?
                .into_result()?;
            info!(host = %session.host(), files = report.items.len(), "Directory mirrored");
            Ok(local_dir.join(name))
        }
        FetchMode::Archive => {
            let script = archive_directory_script(remote_dir).render();
            let outcome = CommandExecutor::new()
                .run_to_completion(session, &script)
                .await?;
            if !outcome.succeeded() {
                return Err(RunError::Execution {
                    host: session.host().to_string(),
                    diagnostic: outcome.diagnostic(),
                });
            }

            let archive = format!("{}.tar", remote_dir);
            let local = local_dir.join(format!("{}.tar", name));
            transfer
                .download(session, &archive, &local.to_string_lossy())
                .await?
                .into_result()?;
            info!(host = %session.host(), path = %local.display(), "Archive fetched");
            Ok(local)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_remote::{MockConnector, MockExec, TransferError};

    const RUN_DIR: &str = "/usr/local/JmeterTest/TestCase/2026_10_18_09_30_00";

    fn config() -> Config {
        let mut config = Config::default();
        config.ssh.connect_backoff_secs = 0;
        config.timing.transfer_delay_secs = 0;
        config
    }

    // ===========================================
    // Archive Tests
    // ===========================================

    #[tokio::test]
    async fn archive_mode_tars_then_downloads() {
        let connector = MockConnector::new();
        connector.respond(
            "10.0.0.1",
            "tar -cf",
            MockExec::ok().creating(&format!("{}.tar", RUN_DIR), b"archive"),
        );
        let local = tempfile::tempdir().unwrap();

        let path = fetch_remote(
            &config(),
            Arc::new(connector.clone()),
            "10.0.0.1",
            &format!("{}/", RUN_DIR),
            local.path(),
            FetchMode::Archive,
        )
        .await
        .unwrap();

        assert_eq!(path, local.path().join("2026_10_18_09_30_00.tar"));
        assert_eq!(std::fs::read(&path).unwrap(), b"archive");
        assert_eq!(connector.session_closes("10.0.0.1"), 1);
    }

    #[tokio::test]
    async fn failed_tar_is_execution_error() {
        let connector = MockConnector::new();
        connector.respond("10.0.0.1", "tar -cf", MockExec::exit(2).with_stderr("No such file"));
        let local = tempfile::tempdir().unwrap();

        let result = fetch_remote(
            &config(),
            Arc::new(connector.clone()),
            "10.0.0.1",
            RUN_DIR,
            local.path(),
            FetchMode::Archive,
        )
        .await;

        assert!(matches!(result, Err(RunError::Execution { .. })));
        assert_eq!(connector.session_closes("10.0.0.1"), 1);
    }

    // ===========================================
    // Mirror Tests
    // ===========================================

    #[tokio::test]
    async fn mirror_mode_walks_the_tree() {
        let connector = MockConnector::new();
        connector.put_file("10.0.0.1", &format!("{}/load.jmx.jtl", RUN_DIR), b"jtl");
        connector.put_file("10.0.0.1", &format!("{}/report/index.html", RUN_DIR), b"<html/>");
        let local = tempfile::tempdir().unwrap();

        let path = fetch_remote(
            &config(),
            Arc::new(connector.clone()),
            "10.0.0.1",
            RUN_DIR,
            local.path(),
            FetchMode::Mirror,
        )
        .await
        .unwrap();

        assert_eq!(path, local.path().join("2026_10_18_09_30_00"));
        assert_eq!(std::fs::read(path.join("report/index.html")).unwrap(), b"<html/>");
        assert!(connector.commands("10.0.0.1").is_empty());
    }

    #[tokio::test]
    async fn mirror_of_missing_directory_fails() {
        let connector = MockConnector::new();
        let local = tempfile::tempdir().unwrap();

        let result = fetch_remote(
            &config(),
            Arc::new(connector.clone()),
            "10.0.0.1",
            "/does/not/exist",
            local.path(),
            FetchMode::Mirror,
        )
        .await;

        assert!(matches!(
            result,
            Err(RunError::Transfer(TransferError::Listing { .. }))
        ));
        assert!(!local.path().join("exist").exists());
        assert_eq!(connector.session_closes("10.0.0.1"), 1);
    }

    #[tokio::test]
    async fn unreachable_host_is_connectivity_error() {
        let connector = MockConnector::new();
        connector.unreachable("10.0.0.9");
        let local = tempfile::tempdir().unwrap();

        let result = fetch_remote(
            &config(),
            Arc::new(connector),
            "10.0.0.9",
            RUN_DIR,
            local.path(),
            FetchMode::Archive,
        )
        .await;
        assert!(matches!(result, Err(RunError::Connectivity(_))));
    }

    #[tokio::test]
    async fn transfer_retries_follow_timing_config() {
        let connector = MockConnector::new();
        connector.put_file("10.0.0.1", &format!("{}/a.jtl", RUN_DIR), b"a");
        connector.fail_transfers("10.0.0.1", &format!("{}/a.jtl", RUN_DIR), 10);
        let mut config = config();
        config.timing.transfer_attempts = 2;
        let local = tempfile::tempdir().unwrap();

        let result = fetch_remote(
            &config,
            Arc::new(connector.clone()),
            "10.0.0.1",
            RUN_DIR,
            local.path(),
            FetchMode::Mirror,
        )
        .await;

        assert!(matches!(result, Err(RunError::Transfer(_))));
        assert_eq!(connector.transfer_attempts("10.0.0.1", &format!("{}/a.jtl", RUN_DIR)), 2);
    }
}
