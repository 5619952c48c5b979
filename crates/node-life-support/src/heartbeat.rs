//! Node lease renewal.
//!
//! The kubelet normally renews `kube-node-lease/<node>` every few seconds.
//! Renewing it from here keeps the node lifecycle controller from marking the
//! node `Unknown` and evicting its pods.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::debug;

use crate::api::NodeApi;
use crate::error::UpdateError;

/// Format a lease `renewTime`.
///
/// The API server parses `MicroTime` strictly: exactly six fractional digits
/// and a `Z` designator.
pub fn format_renew_time(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Merge patch that touches only `holderIdentity` and `renewTime`.
pub fn lease_patch(node_name: &str, now: DateTime<Utc>) -> Value {
    json!({
        "spec": {
            "holderIdentity": node_name,
            "renewTime": format_renew_time(now),
        }
    })
}

/// Renew the lease for `node_name`, holding it in the node's own name.
pub async fn renew_heartbeat<A>(api: &A, node_name: &str) -> Result<(), UpdateError>
where
    A: NodeApi + ?Sized,
{
    let patch = lease_patch(node_name, Utc::now());
    api.patch_lease(node_name, &patch).await?;
    debug!(node = %node_name, "Renewed node lease");
    Ok(())
}
