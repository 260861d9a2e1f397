//! Session abstraction for fleet hosts.
//!
//! A session is one authenticated connection to one host. Every operation
//! opens its own typed channel from the session and closes it when done:
//! - [`ExecChannel`] runs exactly one command and streams its events
//! - [`FileChannel`] performs file operations for one batch
//!
//! The [`ShellConnector`] produces sessions. Production code uses
//! [`SshConnector`] (russh + SFTP); tests use [`MockConnector`].
//!
//! # Example
//!
//! ```ignore
//! let connector = MockConnector::new();
//! let session = connector.connect("10.0.0.1", &credentials).await?;
//! let mut channel = session.open_exec().await?;
//! channel.exec("hostname").await?;
//! while let Some(event) = channel.next_event().await { /* ... */ }
//! channel.close().await?;
//! ```

mod mock;
mod ssh;

pub use mock::{MockConnector, MockExec};
pub use ssh::SshConnector;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Session and channel errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// TCP or handshake failure.
    #[error("connection to {host} failed: {reason}")]
    ConnectFailed {
        /// Host address.
        host: String,
        /// Cause.
        reason: String,
    },

    /// The host rejected the credentials.
    #[error("authentication rejected by {host}")]
    AuthRejected {
        /// Host address.
        host: String,
    },

    /// Opening or driving a channel failed.
    #[error("channel error: {0}")]
    Channel(String),

    /// A file operation failed on the remote side.
    #[error("file operation failed: {0}")]
    File(String),

    /// Local I/O failed.
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session was already closed.
    #[error("session closed")]
    Closed,
}

/// Password credentials plus connection settings.
#[derive(Clone)]
pub struct Credentials {
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
    /// SSH port.
    pub port: u16,
    /// Inactivity timeout of an idle session.
    pub idle_timeout: Duration,
}

impl Credentials {
    /// Password login on port 22 with a ten-minute idle timeout.
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            port: 22,
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

/// One event emitted by a running command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A chunk of standard output.
    Stdout(Vec<u8>),
    /// A chunk of standard error.
    Stderr(Vec<u8>),
    /// The command's exit status.
    ExitStatus(u32),
    /// The remote side finished sending.
    Eof,
}

/// A remote directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Entry name, without directory.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Channel running a single command.
#[async_trait]
pub trait ExecChannel: Send {
    /// Start `command`.
    async fn exec(&mut self, command: &str) -> Result<(), SessionError>;

    /// Next event, or `None` once the channel is closed.
    async fn next_event(&mut self) -> Option<ChannelEvent>;

    /// Close the channel.
    async fn close(self: Box<Self>) -> Result<(), SessionError>;
}

/// Channel performing file operations.
#[async_trait]
pub trait FileChannel: Send {
    /// Copy a local file to `remote`. Returns bytes written.
    async fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, SessionError>;

    /// Copy `remote` to a local file. Returns bytes written.
    async fn download(&mut self, remote: &str, local: &Path) -> Result<u64, SessionError>;

    /// List a remote directory, without `.` and `..`.
    async fn list_dir(&mut self, remote: &str) -> Result<Vec<RemoteEntry>, SessionError>;

    /// Check whether a remote path exists.
    async fn exists(&mut self, remote: &str) -> Result<bool, SessionError>;

    /// Close the channel.
    async fn close(self: Box<Self>) -> Result<(), SessionError>;
}

/// An authenticated connection to one host.
///
/// Sessions are shared as `Arc<dyn RemoteSession>` across phases; each
/// operation opens its own channel.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Host address this session is bound to.
    fn host(&self) -> &str;

    /// Open a command channel.
    async fn open_exec(&self) -> Result<Box<dyn ExecChannel>, SessionError>;

    /// Open a file channel.
    async fn open_files(&self) -> Result<Box<dyn FileChannel>, SessionError>;

    /// Disconnect.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Factory for sessions.
#[async_trait]
pub trait ShellConnector: Send + Sync {
    /// One connection attempt to `host`.
    async fn connect(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn RemoteSession>, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::password("root", "hunter2");
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("root"));
        assert_eq!(creds.port, 22);
        assert_eq!(creds.idle_timeout, Duration::from_secs(600));
    }

    #[test]
    fn error_messages_carry_host() {
        let err = SessionError::ConnectFailed {
            host: "10.0.0.1".into(),
            reason: "refused".into(),
        };
        assert_eq!(err.to_string(), "connection to 10.0.0.1 failed: refused");
    }
}
