// src/health/checker.rs
use super::prober::probe;
use crate::config::HealthCheckConfig;
use crate::load_balancer::{BackendSet, SharedBackendSet};
use crate::metrics::MetricsCollector;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct HealthChecker {
    config: HealthCheckConfig,
    backends: SharedBackendSet,
    metrics: Option<Arc<MetricsCollector>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheckSummary {
    pub healthy: usize,
    pub unhealthy: usize,
}

impl HealthChecker {
    pub fn new(
        config: HealthCheckConfig,
        backends: SharedBackendSet,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            config,
            backends,
            metrics,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Probes every backend once per interval, forever. The first round runs
    /// one interval after start.
    pub async fn run(self) {
        let period = self.config.interval();
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval = ?period,
            timeout = ?self.config.timeout(),
            "Starting health checker"
        );

        loop {
            interval.tick().await;
            self.check_all_backends().await;
        }
    }

    /// Runs one round against the set that is current when the round starts.
    /// A reload during the round takes effect on the next one.
    pub async fn check_all_backends(&self) -> HealthCheckSummary {
        let backends = self.backends.load_full();
        let mut summary = HealthCheckSummary::default();

        for backend in backends.iter() {
            let alive = probe(backend.address(), self.config.timeout()).await;
            let was_alive = backend.record_probe(alive);

            match (was_alive, alive) {
                (false, true) => info!(backend = %backend.address(), "Backend is back up"),
                (true, false) => warn!(backend = %backend.address(), "Backend is down"),
                _ => debug!(backend = %backend.address(), alive, "Backend unchanged"),
            }

            if alive {
                summary.healthy += 1;
            } else {
                summary.unhealthy += 1;
            }

            // skip metric writes once the set has been swapped out
            if let Some(metrics) = self.metrics.as_ref().filter(|_| self.is_current(&backends)) {
                metrics.record_health_check(backend.address(), alive);
            }
        }

        if let Some(metrics) = self.metrics.as_ref().filter(|_| self.is_current(&backends)) {
            metrics.update_backend_counts(summary.healthy, backends.len());
        }

        debug!(
            healthy = summary.healthy,
            unhealthy = summary.unhealthy,
            "Health check complete"
        );

        summary
    }

    fn is_current(&self, snapshot: &Arc<BackendSet>) -> bool {
        Arc::ptr_eq(snapshot, &self.backends.load())
    }
}
