//! Runtime configuration.
//!
//! Built once at startup from flags and environment, validated, and then
//! shared read-only with the scheduler and reconciler for the life of the
//! process.

use std::collections::BTreeSet;
use std::time::Duration;

use clap::Args as ClapArgs;

use crate::error::{Error, Result};

/// Namespace the kubelet writes node leases to.
pub const DEFAULT_LEASE_NAMESPACE: &str = "kube-node-lease";

/// Field manager recorded on every patch.
pub const DEFAULT_FIELD_MANAGER: &str = "node-life-support";

/// Seconds between sync cycles.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

/// Set of node label keys that make a node eligible.
///
/// Keys only, never `key=value` pairs. An empty set admits every node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedLabels {
    keys: BTreeSet<String>,
}

impl AllowedLabels {
    /// Build the set from individual keys, trimming whitespace and dropping
    /// empty entries.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keys }
    }

    /// Parse a comma-separated allowlist such as `"disktype, gpu"`.
    pub fn parse(raw: &str) -> Self {
        Self::from_keys(raw.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl std::fmt::Display for AllowedLabels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.keys.is_empty() {
            return write!(f, "<all nodes>");
        }
        let keys: Vec<&str> = self.iter().collect();
        write!(f, "{}", keys.join(","))
    }
}

/// Backoff applied after consecutive cycle-level failures.
///
/// Per-node failures never feed into this; only a failed node listing does.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Upper bound on the wait between cycles.
    pub max_delay: Duration,
    /// Growth factor per consecutive failure.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
        }
    }
}

/// Main configuration for the life support loop.
#[derive(Debug, Clone)]
pub struct LifeSupportConfig {
    /// Label keys selecting which nodes to keep alive.
    pub allowed_labels: AllowedLabels,
    /// Period between sync cycles.
    pub sync_interval: Duration,
    /// Namespace holding the node leases.
    pub lease_namespace: String,
    /// Maximum nodes reconciled at once. `1` keeps the cycle strictly sequential.
    pub concurrency: usize,
    /// Stretch the wait after failed cycles. `None` retries on the fixed period.
    pub cycle_backoff: Option<BackoffConfig>,
    /// Leave a node alone when its own `Ready` heartbeat is newer than this.
    pub agent_grace: Option<Duration>,
    /// Send patches with server-side dry run.
    pub dry_run: bool,
    /// Field manager name recorded on patches.
    pub field_manager: String,
}

impl Default for LifeSupportConfig {
    fn default() -> Self {
        Self {
            allowed_labels: AllowedLabels::default(),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            lease_namespace: DEFAULT_LEASE_NAMESPACE.to_string(),
            concurrency: 1,
            cycle_backoff: None,
            agent_grace: None,
            dry_run: false,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
        }
    }
}

impl LifeSupportConfig {
    /// Validate the configuration before the first cycle.
    pub fn validate(&self) -> Result<()> {
        if self.sync_interval.is_zero() {
            return Err(Error::Config("sync interval must be greater than zero".to_string()));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if self.lease_namespace.trim().is_empty() {
            return Err(Error::Config("lease namespace must not be empty".to_string()));
        }
        if self.field_manager.trim().is_empty() {
            return Err(Error::Config("field manager must not be empty".to_string()));
        }
        if let Some(backoff) = &self.cycle_backoff {
            if backoff.max_delay < self.sync_interval {
                return Err(Error::Config(format!(
                    "backoff ceiling {:?} is shorter than the sync interval {:?}",
                    backoff.max_delay, self.sync_interval
                )));
            }
            if backoff.multiplier < 1.0 {
                return Err(Error::Config(format!(
                    "backoff multiplier must be at least 1.0, got {}",
                    backoff.multiplier
                )));
            }
        }
        Ok(())
    }
}

/// Command line and environment options mapped onto [`LifeSupportConfig`].
#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
    /// Comma-separated node label keys; nodes carrying any of them are kept alive.
    /// Empty means every node.
    #[arg(long, env = "NODE_LABEL_ALLOWLIST", default_value = "")]
    pub node_label_allowlist: String,

    /// Seconds between sync cycles.
    #[arg(long, env = "SYNC_INTERVAL_SECS", default_value_t = DEFAULT_SYNC_INTERVAL_SECS)]
    pub sync_interval_secs: u64,

    /// Namespace holding node leases.
    #[arg(long, env = "LEASE_NAMESPACE", default_value = DEFAULT_LEASE_NAMESPACE)]
    pub lease_namespace: String,

    /// Nodes reconciled concurrently within a cycle.
    #[arg(long, env = "SYNC_CONCURRENCY", default_value_t = 1)]
    pub concurrency: usize,

    /// Back off after failed node listings, up to this many seconds.
    #[arg(long, env = "CYCLE_BACKOFF_MAX_SECS")]
    pub cycle_backoff_max_secs: Option<u64>,

    /// Skip nodes whose own Ready heartbeat is younger than this many seconds.
    #[arg(long, env = "AGENT_GRACE_SECS")]
    pub agent_grace_secs: Option<u64>,

    /// Send every patch with server-side dry run.
    #[arg(long, env = "DRY_RUN", default_value = "false")]
    pub dry_run: bool,

    /// Field manager recorded on patches.
    #[arg(long, env = "FIELD_MANAGER", default_value = DEFAULT_FIELD_MANAGER)]
    pub field_manager: String,
}

impl Args {
    /// Convert parsed options into a validated configuration.
    pub fn into_config(self) -> Result<LifeSupportConfig> {
        let config = LifeSupportConfig {
            allowed_labels: AllowedLabels::parse(&self.node_label_allowlist),
            sync_interval: Duration::from_secs(self.sync_interval_secs),
            lease_namespace: self.lease_namespace,
            concurrency: self.concurrency,
            cycle_backoff: self.cycle_backoff_max_secs.map(|max| BackoffConfig {
                max_delay: Duration::from_secs(max),
                ..BackoffConfig::default()
            }),
            agent_grace: self.agent_grace_secs.map(Duration::from_secs),
            dry_run: self.dry_run,
            field_manager: self.field_manager,
        };
        config.validate()?;
        Ok(config)
    }
}
