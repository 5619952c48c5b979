//! `Ready` condition assertion.
//!
//! The condition is written to the node's `status` subresource with a
//! strategic merge patch, so the API server matches on `type` and replaces
//! the whole `Ready` entry while leaving the other conditions in place.
//! Last writer wins: if the kubelet comes back it will overwrite this entry,
//! and the next cycle will overwrite the kubelet's.

use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Node, NodeCondition};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use serde_json::{json, Value};
use tracing::debug;

use crate::api::NodeApi;
use crate::error::UpdateError;

pub const READY_CONDITION: &str = "Ready";
pub const READY_REASON: &str = "NodeLifeSupportOverride";
pub const READY_MESSAGE: &str = "node-life-support controller asserting node health.";

/// The `Ready=True` condition stamped with `now` for both timestamps.
pub fn ready_condition(now: DateTime<Utc>) -> NodeCondition {
    NodeCondition {
        type_: READY_CONDITION.to_string(),
        status: "True".to_string(),
        last_heartbeat_time: Some(Time(now)),
        last_transition_time: Some(Time(now)),
        reason: Some(READY_REASON.to_string()),
        message: Some(READY_MESSAGE.to_string()),
    }
}

/// Status patch carrying exactly one `Ready` condition.
pub fn status_patch(now: DateTime<Utc>) -> Result<Value, serde_json::Error> {
    let condition = serde_json::to_value(ready_condition(now))?;
    Ok(json!({
        "status": {
            "conditions": [condition],
        }
    }))
}

/// Assert `Ready=True` on `node_name`, regardless of its current state.
pub async fn assert_ready<A>(api: &A, node_name: &str) -> Result<(), UpdateError>
where
    A: NodeApi + ?Sized,
{
    let patch = status_patch(Utc::now())?;
    api.patch_node_status(node_name, &patch).await?;
    debug!(node = %node_name, "Asserted Ready condition");
    Ok(())
}

/// True when someone other than us refreshed the node's `Ready` condition
/// within `grace` of `now`, which means the kubelet is reporting again.
pub fn recently_reported_by_agent(node: &Node, grace: Duration, now: DateTime<Utc>) -> bool {
    let Some(ready) = node
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conds| conds.iter().find(|c| c.type_ == READY_CONDITION))
    else {
        return false;
    };

    if ready.reason.as_deref() == Some(READY_REASON) {
        return false;
    }

    let Some(Time(heartbeat)) = ready.last_heartbeat_time.as_ref() else {
        return false;
    };
    let Ok(grace) = chrono::Duration::from_std(grace) else {
        return false;
    };

    now.signed_duration_since(*heartbeat) <= grace
}
