//! Error types for node life support.

use serde::Serialize;
use thiserror::Error;

/// Errors raised while patching a node's lease or status.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Failed to serialize patch: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The reconciliation step that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStep {
    /// Lease renewal in the node lease namespace.
    Heartbeat,
    /// `Ready` condition assertion on the node status subresource.
    Status,
}

impl std::fmt::Display for SyncStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heartbeat => write!(f, "update lease"),
            Self::Status => write!(f, "update node status"),
        }
    }
}

/// A per-node failure, tagged with the step that failed.
#[derive(Error, Debug)]
#[error("{step} failed for node {node}: {source}")]
pub struct SyncError {
    pub node: String,
    pub step: SyncStep,
    #[source]
    pub source: UpdateError,
}

impl SyncError {
    pub(crate) fn new(node: &str, step: SyncStep, source: UpdateError) -> Self {
        Self {
            node: node.to_string(),
            step,
            source,
        }
    }
}

/// Cycle-level and startup errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Listing nodes failed; the whole cycle is abandoned.
    #[error("Failed to list nodes: {0}")]
    ListNodes(#[source] kube::Error),

    /// The Kubernetes client could not be constructed.
    #[error("Failed to build Kubernetes client: {0}")]
    Client(#[source] kube::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
