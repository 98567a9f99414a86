// src/metrics/collector.rs
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Instant;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        buffer
    }
}

pub struct MetricsCollector {
    // Request metrics
    pub requests_total: IntCounterVec,
    pub request_duration_seconds: HistogramVec,
    pub no_healthy_backend_total: IntCounter,

    // Backend metrics
    pub backend_health_status: IntGaugeVec,
    pub health_checks_total: IntCounterVec,
    pub backend_reloads_total: IntCounter,

    // Backend set metrics
    pub healthy_backends: IntGauge,
    pub total_backends: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        // Request metrics
        let requests_total = IntCounterVec::new(
            Opts::new("lb_requests_total", "Total number of forwarded requests"),
            &["method", "status_code", "backend"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "lb_request_duration_seconds",
                "Forwarded request duration in seconds",
            ),
            &["method", "backend"],
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        let no_healthy_backend_total = IntCounter::new(
            "lb_no_healthy_backend_total",
            "Requests rejected because no backend was alive",
        )?;
        registry.register(Box::new(no_healthy_backend_total.clone()))?;

        // Backend metrics
        let backend_health_status = IntGaugeVec::new(
            Opts::new(
                "lb_backend_health_status",
                "Backend health status (1=healthy, 0=unhealthy)",
            ),
            &["backend"],
        )?;
        registry.register(Box::new(backend_health_status.clone()))?;

        let health_checks_total = IntCounterVec::new(
            Opts::new("lb_health_checks_total", "Health probes by result"),
            &["result"],
        )?;
        registry.register(Box::new(health_checks_total.clone()))?;

        let backend_reloads_total = IntCounter::new(
            "lb_backend_reloads_total",
            "Number of backend set replacements",
        )?;
        registry.register(Box::new(backend_reloads_total.clone()))?;

        // Backend set metrics
        let healthy_backends =
            IntGauge::new("lb_healthy_backends", "Number of healthy backends")?;
        registry.register(Box::new(healthy_backends.clone()))?;

        let total_backends =
            IntGauge::new("lb_total_backends", "Total number of backends")?;
        registry.register(Box::new(total_backends.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            no_healthy_backend_total,
            backend_health_status,
            health_checks_total,
            backend_reloads_total,
            healthy_backends,
            total_backends,
        })
    }

    pub fn record_request(
        &self,
        method: &str,
        status_code: u16,
        backend: &str,
        duration: std::time::Duration,
    ) {
        let status = status_code.to_string();
        self.requests_total
            .with_label_values(&[method, &status, backend])
            .inc();

        self.request_duration_seconds
            .with_label_values(&[method, backend])
            .observe(duration.as_secs_f64());
    }

    pub fn record_no_backend(&self) {
        self.no_healthy_backend_total.inc();
    }

    pub fn record_health_check(&self, backend: &str, healthy: bool) {
        let result = if healthy { "up" } else { "down" };
        self.health_checks_total.with_label_values(&[result]).inc();

        self.backend_health_status
            .with_label_values(&[backend])
            .set(i64::from(healthy));
    }

    pub fn record_reload(&self) {
        self.backend_reloads_total.inc();
        // labels of backends that left the set would otherwise linger
        self.backend_health_status.reset();
    }

    pub fn update_backend_counts(&self, healthy: usize, total: usize) {
        self.healthy_backends.set(healthy as i64);
        self.total_backends.set(total as i64);
    }
}

// Helper for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_exposes_recorded_values() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = registry.collector();

        metrics.record_request("GET", 200, "127.0.0.1:9001", std::time::Duration::from_millis(5));
        metrics.record_no_backend();
        metrics.record_health_check("127.0.0.1:9001", false);
        metrics.update_backend_counts(2, 3);

        let text = String::from_utf8(registry.gather()).unwrap();
        assert!(text.contains(
            r#"lb_requests_total{backend="127.0.0.1:9001",method="GET",status_code="200"} 1"#
        ));
        assert!(text.contains("lb_no_healthy_backend_total 1"));
        assert!(text.contains(r#"lb_backend_health_status{backend="127.0.0.1:9001"} 0"#));
        assert!(text.contains(r#"lb_health_checks_total{result="down"} 1"#));
        assert!(text.contains("lb_healthy_backends 2"));
        assert!(text.contains("lb_total_backends 3"));
    }

    #[test]
    fn test_reload_clears_stale_backend_labels() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = registry.collector();

        metrics.record_health_check("127.0.0.1:9001", true);
        metrics.record_reload();

        let text = String::from_utf8(registry.gather()).unwrap();
        assert!(!text.contains(r#"lb_backend_health_status{backend="127.0.0.1:9001"}"#));
        assert!(text.contains("lb_backend_reloads_total 1"));
    }
}
