//! Fixed-interval driver for the fleet sync cycle.
//!
//! One cycle at a time. A cycle that overruns the interval delays the next
//! one instead of queueing missed ticks. Failures never stop the loop; only
//! the shutdown token does.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::NodeApi;
use crate::config::{BackoffConfig, LifeSupportConfig};
use crate::error::Result;
use crate::fleet::{CycleReport, FleetSync};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick.
    Idle,
    /// A sync cycle is in flight.
    Running,
}

/// Wait between cycles, stretched after consecutive list failures when
/// backoff is configured.
#[derive(Debug, Clone)]
pub struct CycleBackoff {
    base: Duration,
    config: Option<BackoffConfig>,
    failures: u32,
}

impl CycleBackoff {
    #[must_use]
    pub fn new(base: Duration, config: Option<BackoffConfig>) -> Self {
        Self {
            base,
            config,
            failures: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay until the next cycle should start.
    pub fn next_delay(&self) -> Duration {
        let Some(config) = &self.config else {
            return self.base;
        };
        if self.failures == 0 {
            return self.base;
        }
        let exponent = i32::try_from(self.failures).unwrap_or(i32::MAX);
        let scaled = self.base.as_secs_f64() * config.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= config.max_delay.as_secs_f64() {
            return config.max_delay;
        }
        Duration::from_secs_f64(scaled).max(self.base)
    }
}

/// Runs [`FleetSync`] on the configured interval until shut down.
pub struct Scheduler<A> {
    fleet: FleetSync<A>,
    state: SchedulerState,
    backoff: CycleBackoff,
    cycles: u64,
}

impl<A: NodeApi> Scheduler<A> {
    #[must_use]
    pub fn new(api: A, config: LifeSupportConfig) -> Self {
        let config = Arc::new(config);
        let backoff = CycleBackoff::new(config.sync_interval, config.cycle_backoff.clone());
        Self {
            fleet: FleetSync::new(api, config),
            state: SchedulerState::Idle,
            backoff,
            cycles: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Cycles finished so far, failed ones included.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles
    }

    /// Run a single cycle.
    pub async fn run_once(&mut self) -> Result<CycleReport> {
        self.state = SchedulerState::Running;
        let outcome = self.fleet.sync_all().await;
        self.finish_cycle(outcome.as_ref().err().map(ToString::to_string));
        outcome
    }

    /// Run cycles forever, starting immediately, until `shutdown` fires.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        let interval = self.fleet.config().sync_interval;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = interval.as_secs(),
            allowed_labels = %self.fleet.config().allowed_labels,
            concurrency = self.fleet.config().concurrency,
            "Node life support scheduler started"
        );

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }
                _ = ticker.tick() => {}
            }

            self.state = SchedulerState::Running;
            let outcome = tokio::select! {
                () = shutdown.cancelled() => None,
                outcome = self.fleet.sync_all() => Some(outcome),
            };
            let Some(outcome) = outcome else {
                self.state = SchedulerState::Idle;
                info!("Shutdown requested during sync cycle, abandoning it");
                break;
            };

            self.finish_cycle(outcome.err().map(|e| e.to_string()));

            let delay = self.backoff.next_delay();
            if delay > interval {
                warn!(
                    failures = self.backoff.failures(),
                    delay_secs = delay.as_secs(),
                    "Backing off after failed sync cycles"
                );
                ticker.reset_after(delay);
            }
        }
    }

    fn finish_cycle(&mut self, cycle_error: Option<String>) {
        self.state = SchedulerState::Idle;
        self.cycles += 1;
        match cycle_error {
            None => self.backoff.record_success(),
            Some(e) => {
                error!(error = %e, "Sync cycle failed");
                self.backoff.record_failure();
            }
        }
    }
}
