//! Per-node reconciliation: renew the lease, then assert `Ready`.

use crate::api::NodeApi;
use crate::error::{SyncError, SyncStep};
use crate::heartbeat::renew_heartbeat;
use crate::status::assert_ready;

/// Applies both patches for a single node.
pub struct Reconciler<A> {
    api: A,
}

impl<A: NodeApi> Reconciler<A> {
    #[must_use]
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Renew the node's lease and then assert its `Ready` condition.
    ///
    /// The lease goes first so a failed status patch still leaves a fresh
    /// heartbeat behind. No retries; the next cycle is the retry.
    pub async fn sync_node(&self, node_name: &str) -> Result<(), SyncError> {
        renew_heartbeat(&self.api, node_name)
            .await
            .map_err(|e| SyncError::new(node_name, SyncStep::Heartbeat, e))?;

        assert_ready(&self.api, node_name)
            .await
            .map_err(|e| SyncError::new(node_name, SyncStep::Status, e))?;

        Ok(())
    }
}
