//! # fleet-runner
//!
//! Orchestration for loadfleet.
//!
//! Given a configuration, the runner provisions (or adopts) a fleet, opens
//! one session per host, elects a master and drives a distributed load run:
//!
//! ```text
//!   provision ──► connect_all ──► elect ──► upload ──► configure (slaves, parallel)
//!                                                          │
//!   report ◄── download archive ◄── master run ◄── agent start (slaves, parallel)
//! ```
//!
//! Slave phases record one outcome per host and never abort the run.
//! Anything on the master's path does.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod fanout;
pub mod fetch;
pub mod paths;
pub mod providers;
pub mod settings;

pub use config::{Config, ConfigError};
pub use coordinator::{Coordinator, RunReport};
pub use error::{Result, RunError};
pub use fanout::run_phase;
pub use fetch::{fetch_remote, FetchMode};
pub use paths::{PathResolutionError, PathResolver};
pub use providers::provider_from_config;
pub use settings::RunSettings;
