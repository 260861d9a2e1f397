//! # loadfleet
//!
//! Provision a fleet, drive a distributed load run across it, collect the
//! results.
//!
//! ## Commands
//!
//! - `run`: Run a load test on configured hosts or a freshly provisioned fleet
//! - `provision`: Provision nodes and print their addresses
//! - `release`: Release nodes by instance id
//! - `fetch`: Bring a remote directory back from one host
//!
//! ## Example
//!
//! ```bash
//! # Run on existing hosts, preferring 10.0.0.1 as master
//! loadfleet run --hosts 10.0.0.1,10.0.0.2,10.0.0.3 --master 10.0.0.1
//!
//! # Provision four nodes for three hours and run on them
//! loadfleet run --count 4 --expire-hours 3 --release
//!
//! # Fetch a run directory as a tar archive
//! loadfleet fetch --host 10.0.0.1 /usr/local/JmeterTest/TestCase/2026_10_18_09_30_00
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, error};

mod commands;
mod config;

use commands::{fetch, provision, release, run};

/// Distributed load runs on provisioned fleets.
#[derive(Parser, Debug)]
#[command(name = "loadfleet")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./loadfleet.toml, then the user config directory)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a distributed load test
    Run {
        /// Comma-separated existing hosts (skips provisioning)
        #[arg(long, value_delimiter = ',')]
        hosts: Vec<String>,

        /// Preferred master host
        #[arg(long)]
        master: Option<String>,

        /// Nodes to provision when no hosts are given
        #[arg(long)]
        count: Option<usize>,

        /// Hours until provisioned nodes expire
        #[arg(long)]
        expire_hours: Option<u32>,

        /// Test plan to run
        #[arg(long)]
        script: Option<String>,

        /// Local directory receiving the run archive
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Release provisioned nodes after the run
        #[arg(long)]
        release: bool,
    },

    /// Provision nodes and wait until they run
    Provision {
        /// Nodes to provision
        #[arg(long)]
        count: Option<usize>,

        /// Hours until the nodes expire
        #[arg(long)]
        expire_hours: Option<u32>,
    },

    /// Release nodes by instance id
    Release {
        /// Instance ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Bring a remote directory back from one host
    Fetch {
        /// Host to fetch from
        #[arg(long)]
        host: String,

        /// Remote directory
        remote_dir: String,

        /// Local destination (default: run.report_dir)
        #[arg(long, short)]
        out: Option<PathBuf>,

        /// Download file by file instead of as one tar archive
        #[arg(long)]
        mirror: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("loadfleet started with verbosity level: {}", cli.verbose);

    if let Err(e) = dispatch(cli).await {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            hosts,
            master,
            count,
            expire_hours,
            script,
            report_dir,
            release,
        } => {
            if !hosts.is_empty() {
                config.fleet.hosts = hosts;
            }
            if master.is_some() {
                config.fleet.master = master;
            }
            if let Some(count) = count {
                config.fleet.count = count;
            }
            if let Some(hours) = expire_hours {
                config.fleet.expire_hours = hours;
            }
            if let Some(script) = script {
                config.run.script = script;
            }
            if let Some(dir) = report_dir {
                config.run.report_dir = dir;
            }
            if release {
                config.fleet.release_after_run = true;
            }
            run::run(&config).await
        }
        Commands::Provision {
            count,
            expire_hours,
        } => {
            let count = count.unwrap_or(config.fleet.count);
            let hours = expire_hours.unwrap_or(config.fleet.expire_hours);
            provision::run(&config, count, hours).await
        }
        Commands::Release { ids } => release::run(&config, &ids).await,
        Commands::Fetch {
            host,
            remote_dir,
            out,
            mirror,
        } => {
            let out = out.unwrap_or_else(|| config.run.report_dir.clone());
            fetch::run(&config, &host, &remote_dir, &out, mirror).await
        }
    }
}
