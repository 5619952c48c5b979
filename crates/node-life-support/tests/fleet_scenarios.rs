//! End-to-end cycle scenarios against an in-memory control plane.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::core::{ErrorResponse, ObjectMeta};
use node_life_support::{
    AllowedLabels, Error, FleetSync, LifeSupportConfig, NodeApi, Scheduler, SyncStep,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct ClusterState {
    nodes: Vec<Node>,
    leases: BTreeMap<String, Value>,
    statuses: BTreeMap<String, Value>,
    missing_leases: Vec<String>,
    list_down: bool,
    list_calls: usize,
}

#[derive(Clone, Default)]
struct FakeCluster(Arc<Mutex<ClusterState>>);

impl FakeCluster {
    fn new(nodes: Vec<Node>) -> Self {
        let cluster = Self::default();
        cluster.0.lock().unwrap().nodes = nodes;
        cluster
    }

    fn without_lease(self, name: &str) -> Self {
        self.0.lock().unwrap().missing_leases.push(name.to_string());
        self
    }

    fn list_down(self) -> Self {
        self.0.lock().unwrap().list_down = true;
        self
    }

    fn status_patched(&self) -> Vec<String> {
        self.0.lock().unwrap().statuses.keys().cloned().collect()
    }

    fn lease(&self, name: &str) -> Option<Value> {
        self.0.lock().unwrap().leases.get(name).cloned()
    }

    fn list_calls(&self) -> usize {
        self.0.lock().unwrap().list_calls
    }
}

fn not_found(name: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("leases.coordination.k8s.io \"{name}\" not found"),
        reason: "NotFound".to_string(),
        code: 404,
    })
}

#[async_trait]
impl NodeApi for FakeCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>, kube::Error> {
        let mut state = self.0.lock().unwrap();
        state.list_calls += 1;
        if state.list_down {
            return Err(kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: "etcdserver: request timed out".to_string(),
                reason: "InternalError".to_string(),
                code: 500,
            }));
        }
        Ok(state.nodes.clone())
    }

    async fn patch_lease(&self, name: &str, patch: &Value) -> Result<(), kube::Error> {
        let mut state = self.0.lock().unwrap();
        if state.missing_leases.iter().any(|n| n == name) {
            return Err(not_found(name));
        }
        state.leases.insert(name.to_string(), patch.clone());
        Ok(())
    }

    async fn patch_node_status(&self, name: &str, patch: &Value) -> Result<(), kube::Error> {
        self.0
            .lock()
            .unwrap()
            .statuses
            .insert(name.to_string(), patch.clone());
        Ok(())
    }
}

fn node(name: &str, key: &str, value: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(key.to_string(), value.to_string())])),
            ..ObjectMeta::default()
        },
        ..Node::default()
    }
}

fn fleet_nodes() -> Vec<Node> {
    vec![
        node("n1", "disktype", "ssd"),
        node("n2", "foo", "bar"),
        node("n3", "gpu", "true"),
    ]
}

fn config(allowlist: &str) -> Arc<LifeSupportConfig> {
    Arc::new(LifeSupportConfig {
        allowed_labels: AllowedLabels::parse(allowlist),
        ..LifeSupportConfig::default()
    })
}

#[tokio::test]
async fn allowlisted_nodes_are_kept_alive() {
    let cluster = FakeCluster::new(fleet_nodes());
    let report = FleetSync::new(cluster.clone(), config("disktype,gpu"))
        .sync_all()
        .await
        .unwrap();

    assert_eq!(report.synced, vec!["n1", "n3"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].node, "n2");
    assert_eq!(cluster.status_patched(), vec!["n1", "n3"]);

    let lease = cluster.lease("n1").unwrap();
    assert_eq!(lease["spec"]["holderIdentity"], "n1");
}

#[tokio::test]
async fn empty_allowlist_keeps_every_node_alive() {
    let cluster = FakeCluster::new(fleet_nodes());
    let report = FleetSync::new(cluster.clone(), config(""))
        .sync_all()
        .await
        .unwrap();

    assert_eq!(report.attempted(), 3);
    assert_eq!(cluster.status_patched(), vec!["n1", "n2", "n3"]);
}

#[tokio::test]
async fn missing_lease_fails_only_that_node() {
    let cluster = FakeCluster::new(fleet_nodes()).without_lease("n1");
    let report = FleetSync::new(cluster.clone(), config("disktype,gpu"))
        .sync_all()
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].node, "n1");
    assert_eq!(report.failed[0].step, SyncStep::Heartbeat);
    assert!(report.failed[0].error.contains("not found"));
    assert_eq!(report.synced, vec!["n3"]);
    assert_eq!(cluster.status_patched(), vec!["n3"]);
}

#[tokio::test]
async fn list_outage_aborts_the_cycle() {
    let cluster = FakeCluster::new(fleet_nodes()).list_down();
    let err = FleetSync::new(cluster.clone(), config(""))
        .sync_all()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ListNodes(_)));
    assert!(cluster.status_patched().is_empty());
}

#[tokio::test(start_paused = true)]
async fn list_outage_does_not_stop_the_schedule() {
    let cluster = FakeCluster::new(fleet_nodes()).list_down();
    let mut scheduler = Scheduler::new(cluster.clone(), LifeSupportConfig::default());
    let token = CancellationToken::new();
    let handle = tokio::spawn({
        let token = token.clone();
        async move { scheduler.run(token).await }
    });

    tokio::time::sleep(Duration::from_secs(35)).await;
    token.cancel();
    handle.await.unwrap();

    assert_eq!(cluster.list_calls(), 2);
}
