//! Release nodes by instance id.

use anyhow::{bail, Result};
use fleet_cloud::FleetProvisioner;
use fleet_runner::{provider_from_config, Config};
use fleet_types::InstanceId;

/// Run the release command.
pub async fn run(config: &Config, ids: &[String]) -> Result<()> {
    let ids: Vec<InstanceId> = ids.iter().map(|id| InstanceId::new(id.as_str())).collect();
    let provisioner = FleetProvisioner::new(provider_from_config(config)?);

    let released = provisioner.release_ids(&ids).await;
    println!("Released {} of {} nodes", released, ids.len());
    if released < ids.len() {
        bail!("{} nodes could not be released", ids.len() - released);
    }
    Ok(())
}
