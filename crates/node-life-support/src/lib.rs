//! Node life support.
//!
//! Keeps an operator-selected subset of Kubernetes nodes marked `Ready` when
//! their kubelet can no longer reach the API server. Every cycle the fleet is
//! listed, filtered by label key, and each eligible node gets its
//! `kube-node-lease` Lease renewed and its `Ready` condition re-asserted.
//!
//! ```rust,ignore
//! use node_life_support::{KubeNodeApi, LifeSupportConfig, Scheduler};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = LifeSupportConfig::default();
//! let api = KubeNodeApi::new(kube::Client::try_default().await?, &config);
//! Scheduler::new(api, config).run(CancellationToken::new()).await;
//! ```
//!
//! The assertion is an override, not a health check: nothing here verifies
//! that the node is actually healthy.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod fleet;
pub mod heartbeat;
pub mod reconciler;
pub mod scheduler;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{KubeNodeApi, NodeApi};
pub use config::{AllowedLabels, BackoffConfig, LifeSupportConfig};
pub use error::{Error, Result, SyncError, SyncStep, UpdateError};
pub use fleet::{CycleReport, FleetSync, SkipReason};
pub use reconciler::Reconciler;
pub use scheduler::{Scheduler, SchedulerState};
