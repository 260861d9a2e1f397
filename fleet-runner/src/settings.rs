//! Immutable settings for one run.
//!
//! Built once from a [`Config`] and shared read-only (behind an `Arc`) by
//! every phase and every per-host task.

use crate::config::Config;
use crate::error::{Result, RunError};
use crate::paths::PathResolver;
use fleet_core::{
    default_parameters, Parameter, ReadinessPolicy, RetryPolicy, RunIdentity, RunLayout,
    ToolProfile,
};
use fleet_remote::Credentials;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A local file and where it goes on the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Resolved local path.
    pub local: PathBuf,
    /// Absolute remote destination.
    pub remote: String,
}

/// Everything a run needs, resolved up front.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Identity of this run.
    pub identity: RunIdentity,
    /// Remote directory layout of this run.
    pub layout: RunLayout,
    /// Tool install and agent settings.
    pub profile: ToolProfile,
    /// Login for every host.
    pub credentials: Credentials,
    /// Connection budget per host.
    pub connect_retry: RetryPolicy,
    /// Budget per transfer item.
    pub transfer_retry: RetryPolicy,
    /// Readiness wait of provisioned batches.
    pub readiness: ReadinessPolicy,
    /// Settle delay of fire-and-settle commands.
    pub settle: Duration,
    /// Optional deadline of each parallel phase.
    pub phase_deadline: Option<Duration>,
    /// The test plan.
    pub script: Upload,
    /// Extra files.
    pub resources: Vec<Upload>,
    /// Tool parameters of the master run.
    pub parameters: Vec<Parameter>,
    /// Existing hosts; empty means provision.
    pub hosts: Vec<String>,
    /// Preferred master.
    pub master: Option<String>,
    /// Nodes to provision.
    pub count: usize,
    /// Hours until provisioned nodes expire.
    pub expire_hours: u32,
    /// Release provisioned nodes after the run.
    pub release_after_run: bool,
    /// Local directory receiving the run archive.
    pub report_dir: PathBuf,
}

impl RunSettings {
    /// Resolve `config` for a run identified by `identity`.
    ///
    /// # Errors
    ///
    /// Fails when no test plan is configured or a local path cannot be resolved.
    pub fn build(config: &Config, identity: RunIdentity, resolver: &PathResolver) -> Result<Self> {
        if config.run.script.trim().is_empty() {
            return Err(RunError::Configuration("run.script is not set".into()));
        }

        let layout = RunLayout::new(&config.run.case_root, &identity);
        let run_dir = layout.run_dir();

        let script_local = resolver.resolve(&config.run.script)?;
        let script_name = file_name(&script_local)?;
        let script = Upload {
            remote: format!("{}{}", run_dir, script_name),
            local: script_local,
        };

        let mut resources = Vec::with_capacity(config.run.resources.len());
        for (local, remote) in &config.run.resources {
            let local = resolver.resolve(local)?;
            let remote = resource_destination(&run_dir, &local, remote)?;
            resources.push(Upload { local, remote });
        }

        let parameters = if config.run.parameters.is_empty() {
            default_parameters(&script_name, &layout)
        } else {
            config.run.parameters.clone()
        };

        let profile = ToolProfile {
            root: config.run.tool_root.clone(),
            archive_url: config.run.archive_url.clone(),
            heap: config.run.heap.clone(),
            control_port: config.run.control_port,
            rmi_local_port: config.run.rmi_local_port,
            ..ToolProfile::default()
        };

        let timing = &config.timing;
        Ok(Self {
            identity,
            layout,
            profile,
            credentials: config.ssh.credentials(),
            connect_retry: config.ssh.connect_retry(),
            transfer_retry: timing.transfer_retry(),
            readiness: timing.readiness(),
            settle: Duration::from_secs(timing.settle_secs),
            phase_deadline: timing.phase_deadline_secs.map(Duration::from_secs),
            script,
            resources,
            parameters,
            hosts: clean_hosts(&config.fleet.hosts),
            master: config
                .fleet
                .master
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from),
            count: config.fleet.count,
            expire_hours: config.fleet.expire_hours,
            release_after_run: config.fleet.release_after_run,
            report_dir: config.run.report_dir.clone(),
        })
    }

    /// Every file the master receives: the plan first, then the resources.
    pub fn master_uploads(&self) -> Vec<Upload> {
        let mut uploads = vec![self.script.clone()];
        uploads.extend(self.resources.iter().cloned());
        uploads
    }
}

fn clean_hosts(hosts: &[String]) -> Vec<String> {
    hosts
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .map(String::from)
        .collect()
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| RunError::Configuration(format!("{} has no file name", path.display())))
}

/// Empty or trailing-slash destinations take the local file name. Relative
/// destinations land in the run directory.
fn resource_destination(run_dir: &str, local: &Path, remote: &str) -> Result<String> {
    let remote = remote.trim();
    let mut dest = if remote.starts_with('/') {
        remote.to_string()
    } else {
        format!("{}{}", run_dir, remote)
    };
    if dest.ends_with('/') {
        dest.push_str(&file_name(local)?);
    }
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn identity() -> RunIdentity {
        RunIdentity::at(chrono::Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap())
    }

    fn fixture() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("load.jmx"), b"<plan/>").unwrap();
        std::fs::write(dir.path().join("users.csv"), b"u").unwrap();
        std::fs::write(dir.path().join("ids.txt"), b"1").unwrap();

        let mut config = Config::default();
        config.run.script = "load.jmx".into();
        config.run.resources.insert("users.csv".into(), String::new());
        config.run.resources.insert("ids.txt".into(), "/data/ids.txt".into());
        config.fleet.hosts = vec![" 10.0.0.1 ".into(), String::new(), "10.0.0.2".into()];
        (dir, config)
    }

    #[test]
    fn build_resolves_uploads_into_run_dir() {
        let (dir, config) = fixture();
        let resolver = PathResolver::with_roots(vec![dir.path().to_path_buf()]);
        let settings = RunSettings::build(&config, identity(), &resolver).unwrap();

        let run_dir = "/usr/local/JmeterTest/TestCase/2026_10_18_09_30_00/";
        assert_eq!(settings.script.remote, format!("{}load.jmx", run_dir));
        assert_eq!(settings.script.local, dir.path().join("load.jmx"));

        let remotes: Vec<&str> = settings.resources.iter().map(|r| r.remote.as_str()).collect();
        assert_eq!(remotes, vec!["/data/ids.txt", &format!("{}users.csv", run_dir)[..]]);
        assert_eq!(settings.master_uploads().len(), 3);
        assert_eq!(settings.hosts, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn default_parameters_point_at_the_uploaded_plan() {
        let (dir, config) = fixture();
        let resolver = PathResolver::with_roots(vec![dir.path().to_path_buf()]);
        let settings = RunSettings::build(&config, identity(), &resolver).unwrap();

        let t = settings.parameters.iter().find(|p| p.flag == "-t").unwrap();
        assert_eq!(t.value, settings.script.remote);
        assert!(settings.parameters.iter().any(|p| p.flag == "-r"));
    }

    #[test]
    fn explicit_parameters_are_kept() {
        let (dir, mut config) = fixture();
        config.run.parameters = vec![Parameter::flag("-n"), Parameter::new("-t", "/x.jmx")];
        let resolver = PathResolver::with_roots(vec![dir.path().to_path_buf()]);
        let settings = RunSettings::build(&config, identity(), &resolver).unwrap();
        assert_eq!(settings.parameters, config.run.parameters);
    }

    #[test]
    fn missing_script_is_configuration_error() {
        let config = Config::default();
        let result = RunSettings::build(&config, identity(), &PathResolver::with_roots(vec![]));
        assert!(matches!(result, Err(RunError::Configuration(_))));
    }

    #[test]
    fn unresolvable_resource_is_path_error() {
        let (dir, mut config) = fixture();
        config.run.resources.insert("nowhere.csv".into(), String::new());
        let resolver = PathResolver::with_roots(vec![dir.path().to_path_buf()]);
        let result = RunSettings::build(&config, identity(), &resolver);
        assert!(matches!(result, Err(RunError::Path(_))));
    }

    #[test]
    fn timing_maps_to_policies() {
        let (dir, mut config) = fixture();
        config.timing.transfer_attempts = 2;
        config.timing.phase_deadline_secs = Some(90);
        config.ssh.port = 2222;
        let resolver = PathResolver::with_roots(vec![dir.path().to_path_buf()]);
        let settings = RunSettings::build(&config, identity(), &resolver).unwrap();
        assert_eq!(settings.transfer_retry.max_attempts, 2);
        assert_eq!(settings.phase_deadline, Some(Duration::from_secs(90)));
        assert_eq!(settings.credentials.port, 2222);
        assert_eq!(settings.readiness.attempts_for(2), 5);
    }
}
