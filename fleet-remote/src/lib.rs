//! # fleet-remote
//!
//! Remote sessions for loadfleet.
//!
//! This crate owns every conversation with a fleet host:
//! - [`session`] - session and channel traits, the russh implementation and a mock
//! - [`manager`] - connect one or many hosts with bounded retry
//! - [`exec`] - run a script over a fresh channel (fire-and-settle or to completion)
//! - [`transfer`] - batch upload/download and directory mirroring with per-item retry
//!
//! # Example
//!
//! ```ignore
//! let manager = SessionManager::new(Arc::new(SshConnector::new()));
//! let sessions = manager.connect_all(&hosts, &credentials).await;
//! let executor = CommandExecutor::new();
//! for (host, session) in sessions.iter() {
//!     let outcome = executor.run_to_completion(session.as_ref(), "uptime").await?;
//!     println!("{host}: {:?}", outcome.exit_status);
//! }
//! sessions.close_all().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod exec;
pub mod manager;
pub mod session;
pub mod transfer;

pub use exec::{CommandExecutor, ExecError, ExecOutcome};
pub use manager::{SessionManager, SessionSet};
pub use session::{
    ChannelEvent, Credentials, ExecChannel, FileChannel, MockConnector, MockExec, RemoteEntry,
    RemoteSession, SessionError, ShellConnector, SshConnector,
};
pub use transfer::{FileTransfer, ItemReport, TransferError, TransferReport};
