//! In-memory [`NodeApi`] used by unit tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::core::{ErrorResponse, ObjectMeta};
use serde_json::Value;

use crate::api::NodeApi;

#[derive(Debug, Clone)]
pub enum Call {
    List,
    Lease(String, Value),
    Status(String, Value),
}

#[derive(Default)]
struct State {
    nodes: Vec<Node>,
    fail_list: bool,
    fail_lease: HashSet<String>,
    fail_status: HashSet<String>,
    calls: Vec<Call>,
    in_flight: usize,
    max_in_flight: usize,
}

#[derive(Clone, Default)]
pub struct FakeNodeApi {
    state: Arc<Mutex<State>>,
    latency: Option<Duration>,
}

pub fn node(name: &str, labels: &[(&str, &str)]) -> Node {
    let labels: BTreeMap<String, String> = labels
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        ..Node::default()
    }
}

pub fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("simulated {reason}"),
        reason: reason.to_string(),
        code,
    })
}

impl FakeNodeApi {
    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        let api = Self::default();
        api.state.lock().unwrap().nodes = nodes;
        api
    }

    pub fn fail_list(self) -> Self {
        self.state.lock().unwrap().fail_list = true;
        self
    }

    pub fn fail_lease(self, name: &str) -> Self {
        self.state.lock().unwrap().fail_lease.insert(name.to_string());
        self
    }

    pub fn fail_status(self, name: &str) -> Self {
        self.state.lock().unwrap().fail_status.insert(name.to_string());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.state.lock().unwrap().fail_list = fail;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::List)).count()
    }

    /// Node names that had their status patched, in call order.
    pub fn status_patched(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Status(name, _) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn lease_patched(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Lease(name, _) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            {
                let mut state = self.state.lock().unwrap();
                state.in_flight += 1;
                state.max_in_flight = state.max_in_flight.max(state.in_flight);
            }
            tokio::time::sleep(latency).await;
            self.state.lock().unwrap().in_flight -= 1;
        }
    }
}

#[async_trait]
impl NodeApi for FakeNodeApi {
    async fn list_nodes(&self) -> Result<Vec<Node>, kube::Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List);
        if state.fail_list {
            return Err(api_error(503, "ServiceUnavailable"));
        }
        Ok(state.nodes.clone())
    }

    async fn patch_lease(&self, name: &str, patch: &Value) -> Result<(), kube::Error> {
        self.simulate_latency().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Lease(name.to_string(), patch.clone()));
        if state.fail_lease.contains(name) {
            return Err(api_error(404, "NotFound"));
        }
        Ok(())
    }

    async fn patch_node_status(&self, name: &str, patch: &Value) -> Result<(), kube::Error> {
        self.simulate_latency().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Status(name.to_string(), patch.clone()));
        if state.fail_status.contains(name) {
            return Err(api_error(403, "Forbidden"));
        }
        Ok(())
    }
}
