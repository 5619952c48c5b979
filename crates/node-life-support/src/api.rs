//! Control-plane access used by the reconcile loop.

use async_trait::async_trait;
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::LifeSupportConfig;

/// The three API calls the reconcile loop needs.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// List every node in the cluster in a single call.
    async fn list_nodes(&self) -> Result<Vec<Node>, kube::Error>;

    /// Merge-patch the node's Lease in the lease namespace.
    async fn patch_lease(&self, name: &str, patch: &Value) -> Result<(), kube::Error>;

    /// Strategic-merge-patch the node's status subresource.
    async fn patch_node_status(&self, name: &str, patch: &Value) -> Result<(), kube::Error>;
}

/// [`NodeApi`] backed by a live `kube::Client`.
#[derive(Clone)]
pub struct KubeNodeApi {
    nodes: Api<Node>,
    leases: Api<Lease>,
    patch_params: PatchParams,
}

impl KubeNodeApi {
    #[must_use]
    pub fn new(client: Client, config: &LifeSupportConfig) -> Self {
        let patch_params = PatchParams {
            dry_run: config.dry_run,
            field_manager: Some(config.field_manager.clone()),
            ..PatchParams::default()
        };
        Self {
            nodes: Api::all(client.clone()),
            leases: Api::namespaced(client, &config.lease_namespace),
            patch_params,
        }
    }
}

#[async_trait]
impl NodeApi for KubeNodeApi {
    async fn list_nodes(&self) -> Result<Vec<Node>, kube::Error> {
        let list = self.nodes.list(&ListParams::default()).await?;
        debug!(count = list.items.len(), "Listed nodes");
        Ok(list.items)
    }

    async fn patch_lease(&self, name: &str, patch: &Value) -> Result<(), kube::Error> {
        self.leases
            .patch(name, &self.patch_params, &Patch::Merge(patch))
            .await?;
        Ok(())
    }

    async fn patch_node_status(&self, name: &str, patch: &Value) -> Result<(), kube::Error> {
        self.nodes
            .patch_status(name, &self.patch_params, &Patch::Strategic(patch))
            .await?;
        Ok(())
    }
}
