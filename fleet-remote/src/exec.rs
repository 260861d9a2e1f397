//! Remote command execution.
//!
//! Two modes, both over a fresh channel that is closed on every path:
//! - fire-and-settle: start, drain for a settle delay, close
//! - run-to-completion: drain until the channel closes, then read the exit status

use crate::session::{ChannelEvent, ExecChannel, RemoteSession, SessionError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Command execution errors.
///
/// A non-zero exit status is not an error here; see [`ExecOutcome`].
#[derive(Debug, Error)]
pub enum ExecError {
    /// The channel could not be opened or the command could not start.
    #[error("exec on {host} failed: {source}")]
    Channel {
        /// Host address.
        host: String,
        /// Underlying session error.
        #[source]
        source: SessionError,
    },
}

/// What a command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Host address.
    pub host: String,
    /// Exit status, if the remote side reported one.
    pub exit_status: Option<u32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ExecOutcome {
    fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            exit_status: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Exit status was reported and is zero.
    pub fn succeeded(&self) -> bool {
        self.exit_status == Some(0)
    }

    /// Exit status was reported and is non-zero.
    pub fn failed(&self) -> bool {
        matches!(self.exit_status, Some(code) if code != 0)
    }

    /// Short diagnostic for logs and reports.
    pub fn diagnostic(&self) -> String {
        let status = match self.exit_status {
            Some(code) => format!("exit status {}", code),
            None => "no exit status".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        }
    }
}

/// Runs scripts over sessions.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    settle: Duration,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self {
            settle: Self::SETTLE,
        }
    }
}

impl CommandExecutor {
    /// Default settle delay for fire-and-settle.
    pub const SETTLE: Duration = Duration::from_secs(5);

    /// Executor with the default settle delay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the settle delay.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Start `script`, drain output for the settle delay, then close.
    ///
    /// The exit status is whatever was reported within the delay; it is
    /// usually absent for commands that keep running.
    pub async fn fire_and_settle(
        &self,
        session: &dyn RemoteSession,
        script: &str,
    ) -> Result<ExecOutcome, ExecError> {
        let host = session.host();
        let mut channel = open(session).await?;
        let result = self.settle_on(host, channel.as_mut(), script).await;
        close(host, channel).await;
        result
    }

    async fn settle_on(
        &self,
        host: &str,
        channel: &mut dyn ExecChannel,
        script: &str,
    ) -> Result<ExecOutcome, ExecError> {
        start(host, channel, script).await?;

        let mut outcome = ExecOutcome::new(host);
        let settle = tokio::time::sleep(self.settle);
        tokio::pin!(settle);
        loop {
            tokio::select! {
                biased;
                event = channel.next_event() => match event {
                    Some(event) => record(&mut outcome, &mut String::new(), event),
                    None => break,
                },
                _ = &mut settle => break,
            }
        }
        debug!(host = %host, exit_status = ?outcome.exit_status, "Command settled");
        Ok(outcome)
    }

    /// Run `script` until the channel closes.
    ///
    /// Stdout lines are logged at debug level as they arrive. A non-zero exit
    /// with stderr output is logged as a warning; the caller decides severity.
    pub async fn run_to_completion(
        &self,
        session: &dyn RemoteSession,
        script: &str,
    ) -> Result<ExecOutcome, ExecError> {
        let host = session.host();
        let mut channel = open(session).await?;
        let result = drain(host, channel.as_mut(), script).await;
        close(host, channel).await;
        result
    }
}

async fn open(session: &dyn RemoteSession) -> Result<Box<dyn ExecChannel>, ExecError> {
    session.open_exec().await.map_err(|source| ExecError::Channel {
        host: session.host().to_string(),
        source,
    })
}

async fn start(host: &str, channel: &mut dyn ExecChannel, script: &str) -> Result<(), ExecError> {
    debug!(host = %host, "Executing script:\n{}", script);
    channel.exec(script).await.map_err(|source| ExecError::Channel {
        host: host.to_string(),
        source,
    })
}

async fn close(host: &str, channel: Box<dyn ExecChannel>) {
    if let Err(e) = channel.close().await {
        debug!(host = %host, error = %e, "Channel close failed");
    }
}

async fn drain(
    host: &str,
    channel: &mut dyn ExecChannel,
    script: &str,
) -> Result<ExecOutcome, ExecError> {
    start(host, channel, script).await?;

    let mut outcome = ExecOutcome::new(host);
    let mut pending = String::new();
    while let Some(event) = channel.next_event().await {
        record(&mut outcome, &mut pending, event);
    }
    if !pending.is_empty() {
        debug!(host = %host, "{}", pending);
    }

    if outcome.failed() && !outcome.stderr.trim().is_empty() {
        warn!(host = %host, "Command failed: {}", outcome.diagnostic());
    }
    Ok(outcome)
}

/// Fold one event into the outcome, logging completed stdout lines.
fn record(outcome: &mut ExecOutcome, pending: &mut String, event: ChannelEvent) {
    match event {
        ChannelEvent::Stdout(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            outcome.stdout.push_str(&text);
            pending.push_str(&text);
            while let Some(pos) = pending.find('\n') {
                let line: String = pending.drain(..=pos).collect();
                debug!(host = %outcome.host, "{}", line.trim_end());
            }
        }
        ChannelEvent::Stderr(bytes) => {
            outcome.stderr.push_str(&String::from_utf8_lossy(&bytes));
        }
        ChannelEvent::ExitStatus(code) => outcome.exit_status = Some(code),
        ChannelEvent::Eof => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Credentials, MockConnector, MockExec, ShellConnector};
    use std::sync::Arc;

    async fn session(connector: &MockConnector) -> Arc<dyn RemoteSession> {
        connector
            .connect("10.0.0.7", &Credentials::password("root", "pw"))
            .await
            .unwrap()
    }

    // ===========================================
    // Run-to-completion Tests
    // ===========================================

    #[tokio::test]
    async fn completion_captures_output_and_status() {
        let connector = MockConnector::new();
        connector.respond_all("echo", MockExec::ok().with_stdout("one\ntwo\n"));
        let s = session(&connector).await;

        let outcome = CommandExecutor::new()
            .run_to_completion(s.as_ref(), "echo hi")
            .await
            .unwrap();
        assert_eq!(outcome.exit_status, Some(0));
        assert_eq!(outcome.stdout, "one\ntwo\n");
        assert!(outcome.succeeded());
    }

    #[tokio::test]
    async fn non_zero_exit_is_not_an_error() {
        let connector = MockConnector::new();
        connector.respond_all("false", MockExec::exit(1).with_stderr("denied"));
        let s = session(&connector).await;

        let outcome = CommandExecutor::new()
            .run_to_completion(s.as_ref(), "false")
            .await
            .unwrap();
        assert!(outcome.failed());
        assert_eq!(outcome.stderr, "denied");
        assert_eq!(outcome.diagnostic(), "exit status 1: denied");
    }

    #[tokio::test]
    async fn missing_exit_status_is_none() {
        let connector = MockConnector::new();
        connector.respond_all("x", MockExec::no_status());
        let s = session(&connector).await;

        let outcome = CommandExecutor::new()
            .run_to_completion(s.as_ref(), "x")
            .await
            .unwrap();
        assert_eq!(outcome.exit_status, None);
        assert!(!outcome.succeeded());
        assert!(!outcome.failed());
    }

    // ===========================================
    // Fire-and-settle Tests
    // ===========================================

    #[tokio::test]
    async fn settle_returns_after_delay_for_hanging_command() {
        let connector = MockConnector::new();
        connector.respond_all("server", MockExec::ok().hanging(Duration::from_secs(30)));
        let s = session(&connector).await;

        let executor = CommandExecutor::new().with_settle(Duration::from_millis(20));
        let outcome = executor
            .fire_and_settle(s.as_ref(), "nohup ./server &")
            .await
            .unwrap();
        assert_eq!(outcome.exit_status, None);
        assert_eq!(connector.channels_closed(), 1);
    }

    #[tokio::test]
    async fn settle_reads_prompt_status() {
        let connector = MockConnector::new();
        let s = session(&connector).await;
        let executor = CommandExecutor::new().with_settle(Duration::ZERO);
        let outcome = executor.fire_and_settle(s.as_ref(), "true").await.unwrap();
        assert_eq!(outcome.exit_status, Some(0));
    }

    // ===========================================
    // Channel Lifecycle Tests
    // ===========================================

    #[tokio::test]
    async fn channel_closed_on_every_path() {
        let connector = MockConnector::new();
        connector.respond_all("bad", MockExec::exit(3));
        let s = session(&connector).await;
        let executor = CommandExecutor::new().with_settle(Duration::ZERO);

        executor.run_to_completion(s.as_ref(), "good").await.unwrap();
        executor.run_to_completion(s.as_ref(), "bad").await.unwrap();
        executor.fire_and_settle(s.as_ref(), "good").await.unwrap();

        assert_eq!(connector.channels_opened(), 3);
        assert_eq!(connector.channels_closed(), 3);
    }

    #[tokio::test]
    async fn closed_session_is_channel_error() {
        let connector = MockConnector::new();
        let s = session(&connector).await;
        s.close().await.unwrap();
        let result = CommandExecutor::new().run_to_completion(s.as_ref(), "true").await;
        assert!(matches!(result, Err(ExecError::Channel { .. })));
    }
}
