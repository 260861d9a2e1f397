//! SshConnector - password-authenticated SSH sessions using russh.
//!
//! Command channels map directly onto russh session channels; file channels
//! run the SFTP subsystem (russh-sftp) over a session channel.
//!
//! Host keys are accepted without verification. Fleet hosts are freshly
//! provisioned and have no known key to check against.

use super::{
    ChannelEvent, Credentials, ExecChannel, FileChannel, RemoteEntry, RemoteSession,
    SessionError, ShellConnector,
};
use async_trait::async_trait;
use fleet_core::ProgressTracker;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_sftp::client::SftpSession;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Copy buffer size for SFTP transfers.
const COPY_BUFFER: usize = 32 * 1024;

/// Client handler that accepts any server key.
struct AcceptAnyHostKey;

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Connects to fleet hosts over SSH.
#[derive(Debug, Clone)]
pub struct SshConnector {
    connect_timeout: Duration,
    progress_interval: Duration,
}

impl Default for SshConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            progress_interval: ProgressTracker::INTERVAL,
        }
    }
}

impl SshConnector {
    /// Create a connector with default timeouts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound a single connection attempt.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl ShellConnector for SshConnector {
    async fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn RemoteSession>, SessionError> {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(credentials.idle_timeout),
            ..Default::default()
        });

        let connect = client::connect(config, (host, credentials.port), AcceptAnyHostKey);
        let mut handle = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| SessionError::ConnectFailed {
                host: host.to_string(),
                reason: format!("timed out after {:?}", self.connect_timeout),
            })?
            .map_err(|e| SessionError::ConnectFailed {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        let accepted = handle
            .authenticate_password(credentials.username.as_str(), credentials.password.as_str())
            .await
            .map_err(|e| SessionError::ConnectFailed {
                host: host.to_string(),
                reason: e.to_string(),
            })?;
        if !accepted {
            return Err(SessionError::AuthRejected {
                host: host.to_string(),
            });
        }

        debug!(host = %host, user = %credentials.username, "SSH session established");
        Ok(Arc::new(SshSession {
            host: host.to_string(),
            handle,
            closed: AtomicBool::new(false),
            progress_interval: self.progress_interval,
        }))
    }
}

/// An authenticated russh session.
struct SshSession {
    host: String,
    handle: Handle<AcceptAnyHostKey>,
    closed: AtomicBool,
    progress_interval: Duration,
}

impl SshSession {
    async fn open_channel(&self) -> Result<Channel<Msg>, SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        self.handle
            .channel_open_session()
            .await
            .map_err(|e| SessionError::Channel(e.to_string()))
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn open_exec(&self) -> Result<Box<dyn ExecChannel>, SessionError> {
        let channel = self.open_channel().await?;
        Ok(Box::new(SshExecChannel { channel }))
    }

    async fn open_files(&self) -> Result<Box<dyn FileChannel>, SessionError> {
        let channel = self.open_channel().await?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| SessionError::Channel(e.to_string()))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| SessionError::File(e.to_string()))?;
        Ok(Box::new(SftpFileChannel {
            host: self.host.clone(),
            sftp,
            progress_interval: self.progress_interval,
        }))
    }

    async fn close(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| SessionError::Channel(e.to_string()))
    }
}

/// One command over one russh channel.
struct SshExecChannel {
    channel: Channel<Msg>,
}

#[async_trait]
impl ExecChannel for SshExecChannel {
    async fn exec(&mut self, command: &str) -> Result<(), SessionError> {
        self.channel
            .exec(true, command)
            .await
            .map_err(|e| SessionError::Channel(e.to_string()))
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.channel.wait().await? {
                ChannelMsg::Data { ref data } => return Some(ChannelEvent::Stdout(data.to_vec())),
                ChannelMsg::ExtendedData { ref data, ext } if ext == 1 => {
                    return Some(ChannelEvent::Stderr(data.to_vec()))
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    return Some(ChannelEvent::ExitStatus(exit_status))
                }
                ChannelMsg::Eof => return Some(ChannelEvent::Eof),
                ChannelMsg::Close => return None,
                _ => continue,
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        self.channel
            .close()
            .await
            .map_err(|e| SessionError::Channel(e.to_string()))
    }
}

/// SFTP over one russh channel.
struct SftpFileChannel {
    host: String,
    sftp: SftpSession,
    progress_interval: Duration,
}

impl SftpFileChannel {
    /// Copy `reader` into `writer`, logging progress on the configured interval.
    async fn copy<R, W>(
        &self,
        label: &str,
        total: Option<u64>,
        mut reader: R,
        mut writer: W,
    ) -> Result<u64, SessionError>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let started = Instant::now();
        let mut tracker = ProgressTracker::new(total, self.progress_interval);
        let mut buf = vec![0u8; COPY_BUFFER];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
            if let Some(line) = tracker.advance(n as u64, started.elapsed()) {
                info!(host = %self.host, path = %label, "Transfer progress: {}", line);
            }
        }
        writer.flush().await?;
        writer.shutdown().await?;
        debug!(host = %self.host, path = %label, "Transfer finished: {}", tracker.finish());
        Ok(tracker.transferred())
    }
}

#[async_trait]
impl FileChannel for SftpFileChannel {
    async fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, SessionError> {
        let source = tokio::fs::File::open(local).await?;
        let total = source.metadata().await.ok().map(|m| m.len());
        let target = self
            .sftp
            .create(remote)
            .await
            .map_err(|e| SessionError::File(format!("{}: {}", remote, e)))?;
        self.copy(remote, total, source, target).await
    }

    async fn download(&mut self, remote: &str, local: &Path) -> Result<u64, SessionError> {
        let total = self.sftp.metadata(remote).await.ok().and_then(|m| m.size);
        let source = self
            .sftp
            .open(remote)
            .await
            .map_err(|e| SessionError::File(format!("{}: {}", remote, e)))?;
        let target = tokio::fs::File::create(local).await?;
        self.copy(remote, total, source, target).await
    }

    async fn list_dir(&mut self, remote: &str) -> Result<Vec<RemoteEntry>, SessionError> {
        let entries = self
            .sftp
            .read_dir(remote)
            .await
            .map_err(|e| SessionError::File(format!("{}: {}", remote, e)))?;
        Ok(entries
            .filter(|entry| {
                let name = entry.file_name();
                name != "." && name != ".."
            })
            .map(|entry| RemoteEntry {
                is_dir: entry.file_type().is_dir(),
                name: entry.file_name(),
            })
            .collect())
    }

    async fn exists(&mut self, remote: &str) -> Result<bool, SessionError> {
        self.sftp
            .try_exists(remote)
            .await
            .map_err(|e| SessionError::File(format!("{}: {}", remote, e)))
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        self.sftp
            .close()
            .await
            .map_err(|e| SessionError::File(e.to_string()))
    }
}
