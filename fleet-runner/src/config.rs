//! Configuration loading for loadfleet.
//!
//! Configuration is loaded from a TOML file (default: `loadfleet.toml`).
//! Every section and field has a default, so an empty file is valid.

use fleet_cloud::RegionProfile;
use fleet_core::{Parameter, ReadinessPolicy, RetryPolicy};
use fleet_remote::Credentials;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding `cloud.access_key_id`.
pub const ENV_ACCESS_KEY_ID: &str = "LOADFLEET_ACCESS_KEY_ID";

/// Environment variable overriding `cloud.access_key_secret`.
pub const ENV_ACCESS_KEY_SECRET: &str = "LOADFLEET_ACCESS_KEY_SECRET";

/// Root configuration for loadfleet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Cloud provider configuration.
    #[serde(default)]
    pub cloud: CloudConfig,
    /// Fleet shape.
    #[serde(default)]
    pub fleet: FleetConfig,
    /// Remote shell configuration.
    #[serde(default)]
    pub ssh: SshConfig,
    /// Load run configuration.
    #[serde(default)]
    pub run: RunConfig,
    /// Waits and retry budgets.
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Cloud provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudConfig {
    /// Provider name (default: aliyun).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Region name or id to provision in.
    #[serde(default)]
    pub region: String,
    /// API endpoint host (default: ecs.aliyuncs.com).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Access key id. Overridden by `LOADFLEET_ACCESS_KEY_ID`.
    #[serde(default)]
    pub access_key_id: String,
    /// Access key secret. Overridden by `LOADFLEET_ACCESS_KEY_SECRET`.
    #[serde(default)]
    pub access_key_secret: String,
    /// Value of the `type` tag on created instances (default: jmeter).
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Host name prefix of created instances.
    #[serde(default = "default_host_name")]
    pub host_name: String,
    /// Instance name prefix of created instances.
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
    /// Known regions.
    #[serde(default)]
    pub regions: Vec<RegionProfile>,
}

/// Fleet shape.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    /// Nodes to provision (default: 1).
    #[serde(default = "default_count")]
    pub count: usize,
    /// Hours until the platform releases provisioned nodes (default: 2).
    #[serde(default = "default_expire_hours")]
    pub expire_hours: u32,
    /// Existing hosts. When non-empty, nothing is provisioned.
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Preferred master host.
    #[serde(default)]
    pub master: Option<String>,
    /// Release provisioned nodes once the run finishes (default: false).
    #[serde(default)]
    pub release_after_run: bool,
}

/// Remote shell configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    /// Login user (default: root).
    #[serde(default = "default_username")]
    pub username: String,
    /// Login password.
    #[serde(default)]
    pub password: String,
    /// SSH port (default: 22).
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Session inactivity timeout in seconds (default: 600).
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Connection attempts per host (default: 3).
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Seconds between connection attempts (default: 5).
    #[serde(default = "default_connect_backoff_secs")]
    pub connect_backoff_secs: u64,
    /// Timeout of one connection attempt in seconds (default: 30).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Load run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Test plan to upload and run.
    #[serde(default)]
    pub script: String,
    /// Extra files: local path -> remote destination.
    ///
    /// Relative or empty destinations land in the run directory.
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
    /// Explicit tool parameters. Empty means the default distributed run.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Remote root holding the tool install (default: /usr/local/JmeterTest).
    #[serde(default = "default_tool_root")]
    pub tool_root: String,
    /// Remote root holding run directories (default: /usr/local/JmeterTest/TestCase).
    #[serde(default = "default_case_root")]
    pub case_root: String,
    /// Local directory receiving archives (default: reports).
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    /// JVM heap options (default: -Xms8g -Xmx8g -XX:MaxMetaspaceSize=256m).
    #[serde(default = "default_heap")]
    pub heap: String,
    /// Agent control port (default: 1099).
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    /// Agent local RMI port (default: 4000).
    #[serde(default = "default_rmi_local_port")]
    pub rmi_local_port: u16,
    /// Tool archive download URL.
    #[serde(default = "default_archive_url")]
    pub archive_url: String,
}

/// Waits and retry budgets.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Seconds to wait before the first readiness poll (default: 30).
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,
    /// Seconds between readiness polls (default: 10).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Readiness polls every batch gets on top of its size (default: 3).
    #[serde(default = "default_base_attempts")]
    pub base_attempts: u32,
    /// Seconds a fire-and-settle command is drained (default: 5).
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Attempts per transfer item (default: 4).
    #[serde(default = "default_transfer_attempts")]
    pub transfer_attempts: u32,
    /// Seconds between transfer attempts (default: 3).
    #[serde(default = "default_transfer_delay_secs")]
    pub transfer_delay_secs: u64,
    /// Deadline in seconds for each parallel phase (default: none).
    #[serde(default)]
    pub phase_deadline_secs: Option<u64>,
}

// Default value functions
fn default_provider() -> String {
    "aliyun".to_string()
}

fn default_endpoint() -> String {
    "ecs.aliyuncs.com".to_string()
}

fn default_tag() -> String {
    "jmeter".to_string()
}

fn default_host_name() -> String {
    "loadfleet".to_string()
}

fn default_instance_name() -> String {
    "loadfleet_".to_string()
}

fn default_count() -> usize {
    1
}

fn default_expire_hours() -> u32 {
    2
}

fn default_username() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_idle_timeout_secs() -> u64 {
    600 // 10 minutes
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_connect_backoff_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_tool_root() -> String {
    "/usr/local/JmeterTest".to_string()
}

fn default_case_root() -> String {
    "/usr/local/JmeterTest/TestCase".to_string()
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_heap() -> String {
    "-Xms8g -Xmx8g -XX:MaxMetaspaceSize=256m".to_string()
}

fn default_control_port() -> u16 {
    1099
}

fn default_rmi_local_port() -> u16 {
    4000
}

fn default_archive_url() -> String {
    "https://archive.apache.org/dist/jmeter/binaries/apache-jmeter-5.2.tgz".to_string()
}

fn default_warmup_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_base_attempts() -> u32 {
    3
}

fn default_settle_secs() -> u64 {
    5
}

fn default_transfer_attempts() -> u32 {
    4 // 1 initial + 3 retries
}

fn default_transfer_delay_secs() -> u64 {
    3
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            region: String::new(),
            endpoint: default_endpoint(),
            access_key_id: String::new(),
            access_key_secret: String::new(),
            tag: default_tag(),
            host_name: default_host_name(),
            instance_name: default_instance_name(),
            regions: Vec::new(),
        }
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            expire_hours: default_expire_hours(),
            hosts: Vec::new(),
            master: None,
            release_after_run: false,
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: String::new(),
            port: default_ssh_port(),
            idle_timeout_secs: default_idle_timeout_secs(),
            connect_attempts: default_connect_attempts(),
            connect_backoff_secs: default_connect_backoff_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            script: String::new(),
            resources: BTreeMap::new(),
            parameters: Vec::new(),
            tool_root: default_tool_root(),
            case_root: default_case_root(),
            report_dir: default_report_dir(),
            heap: default_heap(),
            control_port: default_control_port(),
            rmi_local_port: default_rmi_local_port(),
            archive_url: default_archive_url(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            warmup_secs: default_warmup_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            base_attempts: default_base_attempts(),
            settle_secs: default_settle_secs(),
            transfer_attempts: default_transfer_attempts(),
            transfer_delay_secs: default_transfer_delay_secs(),
            phase_deadline_secs: None,
        }
    }
}

impl SshConfig {
    /// Login credentials for every host.
    pub fn credentials(&self) -> Credentials {
        let mut credentials = Credentials::password(&self.username, &self.password);
        credentials.port = self.port;
        credentials.idle_timeout = Duration::from_secs(self.idle_timeout_secs);
        credentials
    }

    /// Connection budget per host.
    pub fn connect_retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.connect_attempts,
            delay: Duration::from_secs(self.connect_backoff_secs),
        }
    }

    /// Timeout of one connection attempt.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl TimingConfig {
    /// Budget per transfer item.
    pub fn transfer_retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.transfer_attempts,
            delay: Duration::from_secs(self.transfer_delay_secs),
        }
    }

    /// Readiness wait for provisioned batches.
    pub fn readiness(&self) -> ReadinessPolicy {
        ReadinessPolicy {
            warmup: Duration::from_secs(self.warmup_secs),
            interval: Duration::from_secs(self.poll_interval_secs),
            base_attempts: self.base_attempts,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Override credentials from the environment via `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup(ENV_ACCESS_KEY_ID).filter(|v| !v.is_empty()) {
            self.cloud.access_key_id = id;
        }
        if let Some(secret) = lookup(ENV_ACCESS_KEY_SECRET).filter(|v| !v.is_empty()) {
            self.cloud.access_key_secret = secret;
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
