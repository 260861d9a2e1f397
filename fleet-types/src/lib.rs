//! # fleet-types
//!
//! Data model shared by all loadfleet crates.
//!
//! This crate provides the foundational types used across the workspace:
//! - [`InstanceId`], [`BatchId`] - Identity of provisioned nodes and batches
//! - [`ComputeNode`], [`NodeState`], [`NodeBatch`] - Fleet lifecycle
//! - [`TransferItem`], [`TransferBatch`], [`Direction`] - File transfer units
//! - [`Role`] - Master/slave role assignment
//! - [`ModelError`] - Invariant violations

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod node;
mod role;
mod transfer;

pub use error::ModelError;
pub use ids::{BatchId, InstanceId};
pub use node::{ComputeNode, NodeBatch, NodeState};
pub use role::Role;
pub use transfer::{Direction, TransferBatch, TransferItem};
