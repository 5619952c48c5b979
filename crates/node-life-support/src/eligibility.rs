//! Label-key allowlist filter.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Node;

use crate::config::AllowedLabels;

impl AllowedLabels {
    /// Returns true if the node should be kept alive.
    ///
    /// A missing node is never admitted. With an empty allowlist every node
    /// is admitted; otherwise the node must carry at least one allowed key,
    /// whatever its value.
    pub fn admits(&self, node: Option<&Node>) -> bool {
        let Some(node) = node else {
            return false;
        };
        match node.metadata.labels.as_ref() {
            Some(labels) => self.matches_labels(labels),
            None => self.is_empty(),
        }
    }

    /// Returns true if the allowlist is empty or shares a key with `labels`.
    pub fn matches_labels(&self, labels: &BTreeMap<String, String>) -> bool {
        if self.is_empty() {
            return true;
        }
        labels.keys().any(|key| self.contains(key))
    }
}
