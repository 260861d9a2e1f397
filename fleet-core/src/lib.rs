//! # fleet-core
//!
//! Pure logic for loadfleet (no I/O, instant tests).
//!
//! This crate decides *what* happens during an orchestrated run without
//! touching the network or disk:
//! - [`topology`] - master election and peer lists
//! - [`script`] - structured remote intent and its shell rendering
//! - [`run`] - run identity and the remote layout derived from it
//! - [`policy`] - bounded retry and readiness budgets
//! - [`outcome`] - per-host results of fan-out phases
//! - [`progress`] - transfer progress reporting
//!
//! The actual I/O (SSH, SFTP, cloud API) is performed by `fleet-remote`,
//! `fleet-cloud` and `fleet-runner`, which interpret these values.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod outcome;
pub mod policy;
pub mod progress;
pub mod run;
pub mod script;
pub mod topology;

pub use outcome::{HostOutcome, HostStatus, Phase, PhaseReport};
pub use policy::{ReadinessPolicy, RetryPolicy};
pub use progress::{format_progress, ProgressTracker};
pub use run::{default_parameters, Parameter, RunIdentity, RunLayout};
pub use script::{
    agent_start_intent, archive_directory_script, master_intent, mkdir_script, render_script,
    slave_intent, CommandScript, InstallSteps, PropertyEdit, ScriptIntent, ToolProfile,
};
pub use topology::{Topology, TopologyError};
