//! Provision nodes without running anything on them.

use anyhow::Result;
use fleet_cloud::FleetProvisioner;
use fleet_runner::{provider_from_config, Config};

/// Run the provision command.
pub async fn run(config: &Config, count: usize, expire_hours: u32) -> Result<()> {
    let provisioner = FleetProvisioner::new(provider_from_config(config)?)
        .with_readiness(config.timing.readiness());

    let mut batch = provisioner.request_nodes(count, expire_hours).await?;
    println!("Requested {} nodes (expire at {})", batch.len(), batch.expires_at);

    let addresses = provisioner.await_ready(&mut batch).await?;
    println!();
    println!("Nodes running:");
    for (node, address) in batch.nodes.iter().zip(&addresses) {
        println!("  {}  {}", node.id, address);
    }
    println!();
    println!("Hosts: {}", addresses.join(","));

    Ok(())
}
