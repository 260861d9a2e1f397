//! Bring a remote directory back from one host.

use anyhow::Result;
use fleet_runner::{fetch_remote, Config, FetchMode};
use std::path::Path;

use super::ssh_connector;

/// Run the fetch command.
pub async fn run(
    config: &Config,
    host: &str,
    remote_dir: &str,
    out: &Path,
    mirror: bool,
) -> Result<()> {
    let mode = if mirror {
        FetchMode::Mirror
    } else {
        FetchMode::Archive
    };
    let path = fetch_remote(config, ssh_connector(config), host, remote_dir, out, mode).await?;
    println!("Fetched {}:{} -> {}", host, remote_dir, path.display());
    Ok(())
}
