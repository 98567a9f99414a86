// src/load_balancer/balancer.rs
use super::{create_selector, LoadBalancerAlgorithm, Selector};
use crate::config::HealthCheckConfig;
use crate::health::HealthChecker;
use crate::metrics::MetricsCollector;
use crate::proxy::{build_client, Backend, HttpClient};
use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// The complete, ordered collection of backends in service.
pub type BackendSet = Vec<Arc<Backend>>;

/// Set identity is swapped as a whole; liveness lives on each `Backend`.
pub type SharedBackendSet = Arc<ArcSwap<BackendSet>>;

pub struct LoadBalancerBuilder {
    algorithm: LoadBalancerAlgorithm,
    health_check: HealthCheckConfig,
    metrics: Option<Arc<MetricsCollector>>,
    client: Option<HttpClient>,
}

impl LoadBalancerBuilder {
    pub fn new() -> Self {
        Self {
            algorithm: LoadBalancerAlgorithm::RoundRobin,
            health_check: HealthCheckConfig::default(),
            metrics: None,
            client: None,
        }
    }

    pub fn with_algorithm(mut self, algorithm: LoadBalancerAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_health_check(mut self, config: HealthCheckConfig) -> Self {
        self.health_check = config;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Upstream client shared by every backend's forwarder.
    pub fn with_client(mut self, client: HttpClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the engine and spawns its health-check loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build<I, S>(self, addresses: I) -> LoadBalancer
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let client = self.client.unwrap_or_else(build_client);
        let selector = create_selector(&self.algorithm);

        let initial = build_backend_set(addresses, &client);
        info!(
            strategy = selector.name(),
            backends = initial.len(),
            "Load balancer initialized"
        );
        if let Some(metrics) = &self.metrics {
            metrics.update_backend_counts(initial.len(), initial.len());
        }

        let backends: SharedBackendSet = Arc::new(ArcSwap::from_pointee(initial));
        let health_task = HealthChecker::new(
            self.health_check,
            Arc::clone(&backends),
            self.metrics.clone(),
        )
        .spawn();

        LoadBalancer {
            backends,
            selector,
            client,
            metrics: self.metrics,
            health_task,
        }
    }
}

impl Default for LoadBalancerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the live backend set, the selector (and with it the rotation
/// cursor), and the background health-check task.
pub struct LoadBalancer {
    backends: SharedBackendSet,
    selector: Arc<dyn Selector>,
    client: HttpClient,
    metrics: Option<Arc<MetricsCollector>>,
    health_task: JoinHandle<()>,
}

impl LoadBalancer {
    /// Round robin with default health checking. Addresses that fail to
    /// parse are logged and skipped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        LoadBalancerBuilder::new().build(addresses)
    }

    pub fn builder() -> LoadBalancerBuilder {
        LoadBalancerBuilder::new()
    }

    /// Replaces the whole backend set. Concurrent readers see either the old
    /// set or the new one. The rotation cursor is kept.
    ///
    /// Returns the number of backends now in service.
    pub fn update_backends<I, S>(&self, addresses: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let next = build_backend_set(addresses, &self.client);
        let count = next.len();
        let addresses: Vec<&str> = next.iter().map(|b| b.url().as_str()).collect();
        info!(backends = ?addresses, "Updated backends");

        self.backends.store(Arc::new(next));

        if let Some(metrics) = &self.metrics {
            metrics.record_reload();
            metrics.update_backend_counts(count, count);
        }

        count
    }

    pub fn next_backend(&self) -> Option<Arc<Backend>> {
        let backends = self.backends.load();
        self.selector.select(&backends)
    }

    /// Snapshot of the current set.
    pub fn backends(&self) -> Arc<BackendSet> {
        self.backends.load_full()
    }

    pub fn len(&self) -> usize {
        self.backends.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn healthy_count(&self) -> usize {
        self.backends.load().iter().filter(|b| b.is_alive()).count()
    }

    pub fn strategy(&self) -> &'static str {
        self.selector.name()
    }
}

impl Drop for LoadBalancer {
    fn drop(&mut self) {
        self.health_task.abort();
    }
}

fn build_backend_set<I, S>(addresses: I, client: &HttpClient) -> BackendSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    addresses
        .into_iter()
        .filter_map(|raw| {
            let raw = raw.as_ref();
            match Backend::parse(raw, client.clone()) {
                Ok(backend) => Some(Arc::new(backend)),
                Err(err) => {
                    warn!(address = raw, error = %err, "Skipping backend");
                    None
                }
            }
        })
        .collect()
}
