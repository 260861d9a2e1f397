//! CLI command implementations.

pub mod fetch;
pub mod provision;
pub mod release;
pub mod run;

use fleet_remote::SshConnector;
use fleet_runner::Config;
use std::sync::Arc;

/// SSH connector configured from the `[ssh]` section.
pub(crate) fn ssh_connector(config: &Config) -> Arc<SshConnector> {
    Arc::new(SshConnector::new().with_connect_timeout(config.ssh.connect_timeout()))
}
