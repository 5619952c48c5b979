//! One sync cycle across the whole fleet.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::NodeApi;
use crate::config::LifeSupportConfig;
use crate::error::{Error, Result, SyncError, SyncStep};
use crate::reconciler::Reconciler;
use crate::status::recently_reported_by_agent;

/// Why a node was left alone this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The node carries none of the allowed label keys.
    NoAllowedLabel,
    /// The node's own agent refreshed `Ready` within the grace window.
    AgentActive,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAllowedLabel => write!(f, "no matching allowed labels"),
            Self::AgentActive => write!(f, "node agent reported recently"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedNode {
    pub node: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedNode {
    pub node: String,
    pub step: SyncStep,
    pub error: String,
}

impl From<&SyncError> for FailedNode {
    fn from(err: &SyncError) -> Self {
        Self {
            node: err.node.clone(),
            step: err.step,
            error: err.source.to_string(),
        }
    }
}

/// Outcome of one cycle. Node order follows the list response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub run_time: DateTime<Utc>,
    pub synced: Vec<String>,
    pub skipped: Vec<SkippedNode>,
    pub failed: Vec<FailedNode>,
}

impl CycleReport {
    fn new(run_time: DateTime<Utc>) -> Self {
        Self {
            run_time,
            ..Self::default()
        }
    }

    /// Nodes the reconciler was invoked for.
    pub fn attempted(&self) -> usize {
        self.synced.len() + self.failed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Lists nodes, filters them, and reconciles each eligible one.
pub struct FleetSync<A> {
    reconciler: Reconciler<A>,
    config: Arc<LifeSupportConfig>,
}

impl<A: NodeApi> FleetSync<A> {
    #[must_use]
    pub fn new(api: A, config: Arc<LifeSupportConfig>) -> Self {
        Self {
            reconciler: Reconciler::new(api),
            config,
        }
    }

    pub fn config(&self) -> &LifeSupportConfig {
        &self.config
    }

    /// Run one cycle.
    ///
    /// Fails only when the node list cannot be fetched. Per-node failures
    /// are logged, collected in the report, and never stop the cycle.
    pub async fn sync_all(&self) -> Result<CycleReport> {
        let nodes = self
            .reconciler
            .api()
            .list_nodes()
            .await
            .map_err(Error::ListNodes)?;

        let now = Utc::now();
        let mut report = CycleReport::new(now);
        let mut eligible = Vec::with_capacity(nodes.len());

        for node in &nodes {
            let name = node.name_any();
            match self.skip_reason(node, now) {
                Some(reason) => {
                    debug!(node = %name, %reason, "Skipping node");
                    report.skipped.push(SkippedNode { node: name, reason });
                }
                None => eligible.push(name),
            }
        }

        let outcomes: Vec<(String, std::result::Result<(), SyncError>)> = stream::iter(eligible)
            .map(|name| async move {
                let outcome = self.reconciler.sync_node(&name).await;
                match &outcome {
                    Ok(()) => info!(node = %name, "Updated node"),
                    Err(e) => warn!(node = %name, step = %e.step, error = %e.source, "Failed updating node"),
                }
                (name, outcome)
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        for (name, outcome) in outcomes {
            match outcome {
                Ok(()) => report.synced.push(name),
                Err(e) => report.failed.push(FailedNode::from(&e)),
            }
        }

        info!(
            listed = nodes.len(),
            synced = report.synced.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Sync cycle complete"
        );

        Ok(report)
    }

    fn skip_reason(&self, node: &Node, now: DateTime<Utc>) -> Option<SkipReason> {
        if !self.config.allowed_labels.admits(Some(node)) {
            return Some(SkipReason::NoAllowedLabel);
        }
        if let Some(grace) = self.config.agent_grace {
            if recently_reported_by_agent(node, grace, now) {
                return Some(SkipReason::AgentActive);
            }
        }
        None
    }
}
