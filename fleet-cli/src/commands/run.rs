//! Run a distributed load test.

use anyhow::Result;
use fleet_core::{HostStatus, RunIdentity};
use fleet_runner::{provider_from_config, Config, Coordinator, PathResolver, RunSettings};
use std::sync::Arc;

use super::ssh_connector;

/// Run the run command.
pub async fn run(config: &Config) -> Result<()> {
    let settings = RunSettings::build(config, RunIdentity::now(), &PathResolver::from_env())?;
    let needs_provider = settings.hosts.is_empty();

    let mut coordinator = Coordinator::new(Arc::new(settings), ssh_connector(config));
    if needs_provider {
        coordinator = coordinator.with_provider(provider_from_config(config)?);
    }

    let report = coordinator.run().await?;

    println!("=== loadfleet run {} ===", report.identity.stamp());
    println!();
    println!("Master:      {}", report.master);
    println!("Slaves:      {}", report.slaves.len());
    for slave in &report.slaves {
        println!("  {}", slave);
    }
    if !report.unreachable.is_empty() {
        println!("Unreachable: {}", report.unreachable.join(", "));
    }
    println!("Archive:     {}", report.artifact.display());
    if let Some(released) = report.released {
        println!("Released:    {} nodes", released);
    }

    let failures = report.failures();
    if failures.is_empty() {
        println!();
        println!("All hosts succeeded.");
    } else {
        println!();
        println!("Failed hosts:");
        for (phase, outcome) in failures {
            if let HostStatus::Failed { reason } = &outcome.status {
                println!("  [{}] {}: {}", phase, outcome.host, reason);
            }
        }
    }

    Ok(())
}
