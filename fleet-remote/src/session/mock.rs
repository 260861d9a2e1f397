//! Mock connector for testing.
//!
//! Scripts connection failures, command responses and transfer faults per
//! host, keeps an in-memory remote filesystem, and records every call for
//! verification. Clones share state.

use super::{
    ChannelEvent, Credentials, ExecChannel, FileChannel, RemoteEntry, RemoteSession,
    SessionError, ShellConnector,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Wildcard host for [`MockConnector::respond`].
const ANY_HOST: &str = "*";

/// Scripted result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockExec {
    /// Emitted on stdout.
    pub stdout: String,
    /// Emitted on stderr.
    pub stderr: String,
    /// Reported exit status; `None` reports none.
    pub exit_status: Option<u32>,
    /// Remote files the command leaves behind.
    pub creates: Vec<(String, Vec<u8>)>,
    /// Delay before the first event.
    pub hang: Option<Duration>,
}

impl MockExec {
    /// Successful command with no output.
    pub fn ok() -> Self {
        Self::exit(0)
    }

    /// Command exiting with `code`.
    pub fn exit(code: u32) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            exit_status: Some(code),
            creates: Vec::new(),
            hang: None,
        }
    }

    /// Command that never reports an exit status.
    pub fn no_status() -> Self {
        Self {
            exit_status: None,
            ..Self::ok()
        }
    }

    /// Set stdout.
    pub fn with_stdout(mut self, stdout: &str) -> Self {
        self.stdout = stdout.to_string();
        self
    }

    /// Set stderr.
    pub fn with_stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.to_string();
        self
    }

    /// Leave a remote file behind.
    pub fn creating(mut self, path: &str, contents: &[u8]) -> Self {
        self.creates.push((path.to_string(), contents.to_vec()));
        self
    }

    /// Delay the first event by `delay`.
    pub fn hanging(mut self, delay: Duration) -> Self {
        self.hang = Some(delay);
        self
    }
}

/// Mock connector for testing.
#[derive(Debug, Default)]
pub struct MockConnector {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Debug, Default)]
struct MockInner {
    connect_failures: HashMap<String, u32>,
    reject_auth: HashSet<String>,
    connect_attempts: HashMap<String, u32>,
    rules: Vec<(String, String, MockExec)>,
    commands: Vec<(String, String)>,
    files: HashMap<String, BTreeMap<String, Vec<u8>>>,
    dirs: HashMap<String, BTreeSet<String>>,
    transfer_failures: HashMap<(String, String), u32>,
    transfer_attempts: HashMap<(String, String), u32>,
    channels_opened: u32,
    channels_closed: u32,
    session_closes: HashMap<String, u32>,
}

impl MockInner {
    fn response_for(&self, host: &str, command: &str) -> MockExec {
        self.rules
            .iter()
            .find(|(h, needle, _)| (h == host || h == ANY_HOST) && command.contains(needle.as_str()))
            .map(|(_, _, exec)| exec.clone())
            .unwrap_or_else(MockExec::ok)
    }

    fn record_transfer(&mut self, host: &str, remote: &str) -> Result<(), SessionError> {
        let key = (host.to_string(), remote.to_string());
        *self.transfer_attempts.entry(key.clone()).or_insert(0) += 1;
        if let Some(remaining) = self.transfer_failures.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SessionError::File(format!("{}: injected fault", remote)));
            }
        }
        Ok(())
    }
}

impl MockConnector {
    /// Create a new mock connector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` connection attempts to `host`.
    pub fn fail_connects(&self, host: &str, count: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.connect_failures.insert(host.to_string(), count);
    }

    /// Make every connection attempt to `host` fail.
    pub fn unreachable(&self, host: &str) {
        self.fail_connects(host, u32::MAX);
    }

    /// Reject the credentials at `host`.
    pub fn reject_auth(&self, host: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.reject_auth.insert(host.to_string());
    }

    /// Connection attempts made to `host`.
    pub fn connect_attempts(&self, host: &str) -> u32 {
        let inner = self.inner.lock().unwrap();
        inner.connect_attempts.get(host).copied().unwrap_or(0)
    }

    /// Answer commands on `host` containing `needle` with `exec`.
    ///
    /// Rules match in registration order; unmatched commands succeed silently.
    pub fn respond(&self, host: &str, needle: &str, exec: MockExec) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .rules
            .push((host.to_string(), needle.to_string(), exec));
    }

    /// Answer commands on any host containing `needle` with `exec`.
    pub fn respond_all(&self, needle: &str, exec: MockExec) {
        self.respond(ANY_HOST, needle, exec);
    }

    /// Commands executed on `host`, in order.
    pub fn commands(&self, host: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .commands
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Place a file on `host`.
    pub fn put_file(&self, host: &str, path: &str, contents: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .files
            .entry(host.to_string())
            .or_default()
            .insert(path.to_string(), contents.to_vec());
    }

    /// Place an empty directory on `host`.
    pub fn put_dir(&self, host: &str, path: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .dirs
            .entry(host.to_string())
            .or_default()
            .insert(path.trim_end_matches('/').to_string());
    }

    /// Contents of a remote file.
    pub fn remote_file(&self, host: &str, path: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.files.get(host).and_then(|f| f.get(path)).cloned()
    }

    /// Fail the next `count` transfers touching `remote` on `host`.
    pub fn fail_transfers(&self, host: &str, remote: &str, count: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .transfer_failures
            .insert((host.to_string(), remote.to_string()), count);
    }

    /// Transfer attempts touching `remote` on `host`.
    pub fn transfer_attempts(&self, host: &str, remote: &str) -> u32 {
        let inner = self.inner.lock().unwrap();
        inner
            .transfer_attempts
            .get(&(host.to_string(), remote.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Transfer attempts across all hosts and paths.
    pub fn total_transfer_attempts(&self) -> u32 {
        let inner = self.inner.lock().unwrap();
        inner.transfer_attempts.values().sum()
    }

    /// Channels opened so far.
    pub fn channels_opened(&self) -> u32 {
        self.inner.lock().unwrap().channels_opened
    }

    /// Channels closed so far.
    pub fn channels_closed(&self) -> u32 {
        self.inner.lock().unwrap().channels_closed
    }

    /// Times the session for `host` was closed.
    pub fn session_closes(&self, host: &str) -> u32 {
        let inner = self.inner.lock().unwrap();
        inner.session_closes.get(host).copied().unwrap_or(0)
    }
}

impl Clone for MockConnector {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl ShellConnector for MockConnector {
    async fn connect(
        &self,
        host: &str,
        _credentials: &Credentials,
    ) -> Result<Arc<dyn RemoteSession>, SessionError> {
        let mut inner = self.inner.lock().unwrap();
        *inner.connect_attempts.entry(host.to_string()).or_insert(0) += 1;

        if let Some(remaining) = inner.connect_failures.get_mut(host) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SessionError::ConnectFailed {
                    host: host.to_string(),
                    reason: "connection refused".to_string(),
                });
            }
        }
        if inner.reject_auth.contains(host) {
            return Err(SessionError::AuthRejected {
                host: host.to_string(),
            });
        }

        Ok(Arc::new(MockSession {
            host: host.to_string(),
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct MockSession {
    host: String,
    inner: Arc<Mutex<MockInner>>,
}

impl MockSession {
    fn ensure_open(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.session_closes.get(&self.host).copied().unwrap_or(0) > 0 {
            return Err(SessionError::Closed);
        }
        inner.channels_opened += 1;
        Ok(())
    }
}

#[async_trait]
impl RemoteSession for MockSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn open_exec(&self) -> Result<Box<dyn ExecChannel>, SessionError> {
        self.ensure_open()?;
        Ok(Box::new(MockExecChannel {
            host: self.host.clone(),
            inner: Arc::clone(&self.inner),
            events: VecDeque::new(),
            hang: None,
        }))
    }

    async fn open_files(&self) -> Result<Box<dyn FileChannel>, SessionError> {
        self.ensure_open()?;
        Ok(Box::new(MockFileChannel {
            host: self.host.clone(),
            inner: Arc::clone(&self.inner),
        }))
    }

    async fn close(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap();
        let closes = inner.session_closes.entry(self.host.clone()).or_insert(0);
        *closes += 1;
        if *closes > 1 {
            return Err(SessionError::Closed);
        }
        Ok(())
    }
}

struct MockExecChannel {
    host: String,
    inner: Arc<Mutex<MockInner>>,
    events: VecDeque<ChannelEvent>,
    hang: Option<Duration>,
}

#[async_trait]
impl ExecChannel for MockExecChannel {
    async fn exec(&mut self, command: &str) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .commands
            .push((self.host.clone(), command.to_string()));
        let response = inner.response_for(&self.host, command);

        let files = inner.files.entry(self.host.clone()).or_default();
        for (path, contents) in &response.creates {
            files.insert(path.clone(), contents.clone());
        }

        if !response.stdout.is_empty() {
            self.events
                .push_back(ChannelEvent::Stdout(response.stdout.into_bytes()));
        }
        if !response.stderr.is_empty() {
            self.events
                .push_back(ChannelEvent::Stderr(response.stderr.into_bytes()));
        }
        if let Some(code) = response.exit_status {
            self.events.push_back(ChannelEvent::ExitStatus(code));
        }
        self.events.push_back(ChannelEvent::Eof);
        self.hang = response.hang;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        if let Some(delay) = self.hang.take() {
            tokio::time::sleep(delay).await;
        }
        self.events.pop_front()
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        self.inner.lock().unwrap().channels_closed += 1;
        Ok(())
    }
}

struct MockFileChannel {
    host: String,
    inner: Arc<Mutex<MockInner>>,
}

#[async_trait]
impl FileChannel for MockFileChannel {
    async fn upload(&mut self, local: &Path, remote: &str) -> Result<u64, SessionError> {
        self.inner
            .lock()
            .unwrap()
            .record_transfer(&self.host, remote)?;
        let contents = tokio::fs::read(local).await?;
        let len = contents.len() as u64;
        let mut inner = self.inner.lock().unwrap();
        inner
            .files
            .entry(self.host.clone())
            .or_default()
            .insert(remote.to_string(), contents);
        Ok(len)
    }

    async fn download(&mut self, remote: &str, local: &Path) -> Result<u64, SessionError> {
        let contents = {
            let mut inner = self.inner.lock().unwrap();
            inner.record_transfer(&self.host, remote)?;
            inner
                .files
                .get(&self.host)
                .and_then(|f| f.get(remote))
                .cloned()
                .ok_or_else(|| SessionError::File(format!("{}: no such file", remote)))?
        };
        tokio::fs::write(local, &contents).await?;
        Ok(contents.len() as u64)
    }

    async fn list_dir(&mut self, remote: &str) -> Result<Vec<RemoteEntry>, SessionError> {
        let inner = self.inner.lock().unwrap();
        let dir = remote.trim_end_matches('/');
        let prefix = format!("{}/", dir);

        let mut entries: BTreeMap<String, bool> = BTreeMap::new();
        let mut found = false;
        if let Some(files) = inner.files.get(&self.host) {
            for path in files.keys() {
                if let Some(rest) = path.strip_prefix(&prefix) {
                    found = true;
                    match rest.split_once('/') {
                        Some((child, _)) => entries.insert(child.to_string(), true),
                        None => entries.insert(rest.to_string(), false),
                    };
                }
            }
        }
        if let Some(dirs) = inner.dirs.get(&self.host) {
            for path in dirs {
                if path == dir {
                    found = true;
                } else if let Some(rest) = path.strip_prefix(&prefix) {
                    found = true;
                    let child = rest.split('/').next().unwrap_or(rest);
                    entries.insert(child.to_string(), true);
                }
            }
        }

        if !found {
            return Err(SessionError::File(format!("{}: no such directory", remote)));
        }
        Ok(entries
            .into_iter()
            .map(|(name, is_dir)| RemoteEntry { name, is_dir })
            .collect())
    }

    async fn exists(&mut self, remote: &str) -> Result<bool, SessionError> {
        let inner = self.inner.lock().unwrap();
        let path = remote.trim_end_matches('/');
        let prefix = format!("{}/", path);
        let in_files = inner
            .files
            .get(&self.host)
            .map(|f| f.keys().any(|k| k == path || k.starts_with(&prefix)))
            .unwrap_or(false);
        let in_dirs = inner
            .dirs
            .get(&self.host)
            .map(|d| d.iter().any(|k| k == path || k.starts_with(&prefix)))
            .unwrap_or(false);
        Ok(in_files || in_dirs)
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        self.inner.lock().unwrap().channels_closed += 1;
        Ok(())
    }
}
