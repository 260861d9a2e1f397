//! # fleet-cloud
//!
//! Fleet provisioning for loadfleet.
//!
//! - [`provider`] - the [`CloudProvider`] capability every platform implements
//! - [`aliyun`] - Aliyun ECS over signed HTTPS
//! - [`signing`] - ACS3-HMAC-SHA256 request signatures
//! - [`mock`] - scripted provider for tests
//! - [`provisioner`] - request nodes, poll until all run, release
//! - [`region`] - region name to region id + launch template

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aliyun;
pub mod error;
pub mod mock;
pub mod provider;
pub mod provisioner;
pub mod region;
pub mod signing;

pub use aliyun::{AliyunConfig, AliyunProvider};
pub use error::{ProvisionError, Result};
pub use mock::MockProvider;
pub use provider::{CloudProvider, InstanceStatus};
pub use provisioner::FleetProvisioner;
pub use region::{RegionCatalog, RegionProfile};
pub use signing::Acs3Signer;
