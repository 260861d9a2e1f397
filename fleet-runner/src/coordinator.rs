//! Topology coordinator: drives one distributed load run end to end.
//!
//! Failures on the master's path (election, master uploads, the master run,
//! the archive download) abort the run. Slave failures are recorded per host
//! in the phase reports and the run continues with the rest. Every session
//! opened for the run is closed exactly once, whatever the outcome.

use crate::error::{Result, RunError};
use crate::fanout::run_phase;
use crate::settings::{RunSettings, Upload};
use fleet_cloud::{CloudProvider, FleetProvisioner};
use fleet_core::{
    agent_start_intent, master_intent, mkdir_script, render_script, slave_intent, HostOutcome,
    Phase, PhaseReport, RunIdentity, ToolProfile, Topology,
};
use fleet_remote::{
    CommandExecutor, FileTransfer, RemoteSession, SessionManager, SessionSet, ShellConnector,
    TransferReport,
};
use fleet_types::{Direction, NodeBatch};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Identity of the run.
    pub identity: RunIdentity,
    /// Elected master.
    pub master: String,
    /// Slaves in election order.
    pub slaves: Vec<String>,
    /// Hosts that never accepted a session.
    pub unreachable: Vec<String>,
    /// Uploads, master first.
    pub upload: PhaseReport,
    /// Slave configuration.
    pub configure: PhaseReport,
    /// Slave agent start.
    pub agent_start: PhaseReport,
    /// Exit status of the master run.
    pub master_exit_status: Option<u32>,
    /// Local path of the downloaded run archive.
    pub artifact: PathBuf,
    /// Nodes provisioned for this run, if any.
    pub provisioned: Option<NodeBatch>,
    /// Nodes released after the run, if release was requested.
    pub released: Option<usize>,
}

impl RunReport {
    /// Every failed host outcome with its phase.
    pub fn failures(&self) -> Vec<(Phase, &HostOutcome)> {
        [&self.upload, &self.configure, &self.agent_start]
            .into_iter()
            .flat_map(|report| report.failed().into_iter().map(move |o| (report.phase, o)))
            .collect()
    }

    /// True when no host failed in any phase.
    pub fn all_succeeded(&self) -> bool {
        self.failures().is_empty()
    }
}

/// Drives a run over a fleet.
pub struct Coordinator {
    settings: Arc<RunSettings>,
    sessions: SessionManager,
    executor: CommandExecutor,
    transfer: FileTransfer,
    provisioner: Option<FleetProvisioner>,
}

impl Coordinator {
    /// Coordinator over existing hosts reached through `connector`.
    pub fn new(settings: Arc<RunSettings>, connector: Arc<dyn ShellConnector>) -> Self {
        Self {
            sessions: SessionManager::new(connector).with_retry(settings.connect_retry),
            executor: CommandExecutor::new().with_settle(settings.settle),
            transfer: FileTransfer::new().with_retry(settings.transfer_retry),
            provisioner: None,
            settings,
        }
    }

    /// Provision through `provider` when no hosts are configured.
    pub fn with_provider(mut self, provider: Arc<dyn CloudProvider>) -> Self {
        self.provisioner =
            Some(FleetProvisioner::new(provider).with_readiness(self.settings.readiness));
        self
    }

    /// Run the whole sequence.
    pub async fn run(&self) -> Result<RunReport> {
        let identity = self.settings.identity.stamp().to_string();
        info!(run = %identity, "Run starting");

        let (hosts, mut batch) = self.acquire_hosts().await?;
        let result = self.run_on(&hosts, batch.is_some()).await;

        let mut released = None;
        if let (Some(batch), Some(provisioner)) = (batch.as_mut(), &self.provisioner) {
            if self.settings.release_after_run {
                released = Some(provisioner.release(batch).await);
            }
        }

        match &result {
            Ok(_) => info!(run = %identity, "Run complete"),
            Err(e) => warn!(run = %identity, error = %e, "Run aborted"),
        }
        result.map(|mut report| {
            report.provisioned = batch;
            report.released = released;
            report
        })
    }

    /// Configured hosts, or a freshly provisioned batch's addresses.
    async fn acquire_hosts(&self) -> Result<(Vec<String>, Option<NodeBatch>)> {
        if !self.settings.hosts.is_empty() {
            return Ok((self.settings.hosts.clone(), None));
        }
        let provisioner = self.provisioner.as_ref().ok_or_else(|| {
            RunError::Configuration("no hosts configured and no cloud provider available".into())
        })?;

        let mut batch = provisioner
            .request_nodes(self.settings.count, self.settings.expire_hours)
            .await?;
        match provisioner.await_ready(&mut batch).await {
            Ok(addresses) => Ok((addresses, Some(batch))),
            Err(e) => {
                if self.settings.release_after_run {
                    provisioner.release(&mut batch).await;
                } else {
                    warn!(
                        batch = %batch.id,
                        expires_at = %batch.expires_at,
                        "Nodes left to expire"
                    );
                }
                Err(e.into())
            }
        }
    }

    async fn run_on(&self, hosts: &[String], fresh: bool) -> Result<RunReport> {
        let set = self
            .sessions
            .connect_all(hosts, &self.settings.credentials)
            .await;
        if set.is_empty() {
            return Err(RunError::Connectivity(format!(
                "none of {} hosts accepted a session",
                hosts.len()
            )));
        }

        let result = self.drive(&set, fresh).await;
        let closed = set.close_all().await;
        debug!(closed, "Sessions closed");
        result
    }

    async fn drive(&self, set: &SessionSet, fresh: bool) -> Result<RunReport> {
        let s = &self.settings;

        let topology = Topology::elect(&set.hosts(), s.master.as_deref())?;
        if let Some(preferred) = &s.master {
            if preferred != topology.master() {
                warn!(
                    preferred = %preferred,
                    master = %topology.master(),
                    "Preferred master not reachable, electing first ready host"
                );
            }
        }
        info!(master = %topology.master(), slaves = topology.slaves().len(), "Topology elected");

        let master_host = topology.master().to_string();
        let master = set.get(&master_host).cloned().ok_or_else(|| {
            RunError::Connectivity(format!("no session for master {}", master_host))
        })?;
        let slaves: Vec<(String, Arc<dyn RemoteSession>)> = topology
            .slaves()
            .iter()
            .filter_map(|h| set.get(h).map(|session| (h.clone(), Arc::clone(session))))
            .collect();

        // Upload
        let mut upload = PhaseReport::new(Phase::Upload);
        self.upload_to_master(master.as_ref()).await?;
        upload.record(HostOutcome::succeeded(&master_host, None));
        if !s.resources.is_empty() {
            for (host, session) in &slaves {
                upload.record(self.upload_resources(host, session.as_ref()).await);
            }
        }

        // Configure
        let configure = run_phase(
            Phase::Configure,
            slaves.clone(),
            s.phase_deadline,
            |host, session| {
                let settings = Arc::clone(&self.settings);
                let executor = self.executor.clone();
                async move { configure_slave(&settings, &executor, host, session, fresh).await }
            },
        )
        .await;

        // Agent start on every slave, whatever configure reported
        let agent_start = run_phase(
            Phase::AgentStart,
            slaves.clone(),
            s.phase_deadline,
            |host, session| {
                let profile = s.profile.clone();
                let executor = self.executor.clone();
                async move { start_agent(&profile, &executor, host, session).await }
            },
        )
        .await;

        // Master run
        let install = needs_install(master.as_ref(), &s.profile, fresh).await;
        let intent = master_intent(
            &s.profile,
            install,
            topology.peer_list(s.profile.control_port),
            s.parameters.clone(),
            &s.layout,
        );
        let script = render_script(&intent).render();
        info!(host = %master_host, install, "Starting master run");
        let outcome = self.executor.run_to_completion(master.as_ref(), &script).await?;
        if !outcome.succeeded() {
            return Err(RunError::Execution {
                host: master_host,
                diagnostic: outcome.diagnostic(),
            });
        }
        info!(host = %master_host, "Master run finished");

        // Collect
        tokio::fs::create_dir_all(&s.report_dir).await?;
        let artifact = s.report_dir.join(s.layout.archive_name());
        self.transfer
            .download(
                master.as_ref(),
                &s.layout.archive_path(),
                &artifact.to_string_lossy(),
            )
            .await?
            .into_result()?;
        info!(path = %artifact.display(), "Run archive downloaded");

        Ok(RunReport {
            identity: s.identity.clone(),
            master: master_host,
            slaves: topology.slaves().to_vec(),
            unreachable: set.unreachable().to_vec(),
            upload,
            configure,
            agent_start,
            master_exit_status: outcome.exit_status,
            artifact,
            provisioned: None,
            released: None,
        })
    }

    /// Create the run directories and upload plan plus resources. Any failure aborts.
    async fn upload_to_master(&self, session: &dyn RemoteSession) -> Result<()> {
        let uploads = self.settings.master_uploads();
        self.make_parent_dirs(session, &uploads).await?;
        self.upload_all(session, uploads).await?.into_result()?;
        Ok(())
    }

    async fn upload_resources(&self, host: &str, session: &dyn RemoteSession) -> HostOutcome {
        let uploads = self.settings.resources.clone();
        if let Err(e) = self.make_parent_dirs(session, &uploads).await {
            return HostOutcome::failed(host, e.to_string());
        }
        match self.upload_all(session, uploads).await {
            Ok(report) => match report.into_result() {
                Ok(_) => HostOutcome::succeeded(host, None),
                Err(e) => HostOutcome::failed(host, e.to_string()),
            },
            Err(e) => HostOutcome::failed(host, e.to_string()),
        }
    }

    async fn make_parent_dirs(
        &self,
        session: &dyn RemoteSession,
        uploads: &[Upload],
    ) -> Result<()> {
        let mut dirs: Vec<&str> = Vec::new();
        for upload in uploads {
            if let Some((parent, _)) = upload.remote.rsplit_once('/') {
                if !parent.is_empty() && !dirs.contains(&parent) {
                    dirs.push(parent);
                }
            }
        }
        for dir in dirs {
            let script = mkdir_script(dir).render();
            let outcome = self.executor.run_to_completion(session, &script).await?;
            if !outcome.succeeded() {
                return Err(RunError::Execution {
                    host: session.host().to_string(),
                    diagnostic: outcome.diagnostic(),
                });
            }
        }
        Ok(())
    }

    async fn upload_all(
        &self,
        session: &dyn RemoteSession,
        uploads: Vec<Upload>,
    ) -> Result<TransferReport> {
        let (sources, destinations): (Vec<String>, Vec<String>) = uploads
            .into_iter()
            .map(|u| (u.local.to_string_lossy().into_owned(), u.remote))
            .unzip();
        Ok(self
            .transfer
            .transfer_batch(session, sources, destinations, Direction::Upload)
            .await?)
    }
}

/// Fresh nodes always install. Otherwise install when the tool home is missing
/// or cannot be checked.
async fn needs_install(session: &dyn RemoteSession, profile: &ToolProfile, fresh: bool) -> bool {
    if fresh {
        return true;
    }
    let mut files = match session.open_files().await {
        Ok(files) => files,
        Err(e) => {
            debug!(host = %session.host(), error = %e, "Cannot check install, installing");
            return true;
        }
    };
    let present = files.exists(&profile.install_path()).await;
    if let Err(e) = files.close().await {
        debug!(host = %session.host(), error = %e, "File channel close failed");
    }
    match present {
        Ok(present) => !present,
        Err(e) => {
            debug!(host = %session.host(), error = %e, "Cannot check install, installing");
            true
        }
    }
}

async fn configure_slave(
    settings: &RunSettings,
    executor: &CommandExecutor,
    host: String,
    session: Arc<dyn RemoteSession>,
    fresh: bool,
) -> HostOutcome {
    let install = needs_install(session.as_ref(), &settings.profile, fresh).await;
    let script = render_script(&slave_intent(&settings.profile, install)).render();
    debug!(host = %host, install, "Configuring slave");
    match executor.run_to_completion(session.as_ref(), &script).await {
        Ok(outcome) if outcome.succeeded() => HostOutcome::succeeded(host, outcome.exit_status),
        Ok(outcome) => HostOutcome::failed(host, outcome.diagnostic()),
        Err(e) => HostOutcome::failed(host, e.to_string()),
    }
}

async fn start_agent(
    profile: &ToolProfile,
    executor: &CommandExecutor,
    host: String,
    session: Arc<dyn RemoteSession>,
) -> HostOutcome {
    let script = render_script(&agent_start_intent(profile)).render();
    match executor.fire_and_settle(session.as_ref(), &script).await {
        Ok(outcome) => match outcome.exit_status {
            Some(code) if code != 0 => HostOutcome::failed(host, outcome.diagnostic()),
            status => HostOutcome::succeeded(host, status),
        },
        Err(e) => HostOutcome::failed(host, e.to_string()),
    }
}
