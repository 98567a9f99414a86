// src/config/models.rs
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address to accept traffic on. `:8080` binds every interface.
    #[serde(default = "default_listen", alias = "port")]
    pub listen: String,

    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Upstream addresses in rotation order.
    #[serde(default)]
    pub backends: Vec<String>,

    #[serde(default)]
    pub health_check: HealthCheckConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;

        if self.health_check.interval_ms == 0 {
            bail!("health_check.interval_ms must be greater than zero");
        }
        if self.health_check.timeout_ms == 0 {
            bail!("health_check.timeout_ms must be greater than zero");
        }
        if !self.metrics.path.starts_with('/') {
            bail!("metrics.path must start with '/', got {:?}", self.metrics.path);
        }

        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let listen = self.listen.trim();
        let normalized = if listen.starts_with(':') {
            format!("0.0.0.0{}", listen)
        } else {
            listen.to_string()
        };

        normalized
            .to_socket_addrs()
            .with_context(|| format!("Invalid listen address {:?}", self.listen))?
            .next()
            .with_context(|| format!("Listen address {:?} did not resolve", self.listen))
    }

    pub fn algorithm(&self) -> LoadBalancerAlgorithm {
        LoadBalancerAlgorithm::from_name(&self.strategy)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            strategy: default_strategy(),
            backends: Vec::new(),
            health_check: HealthCheckConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadBalancerAlgorithm {
    RoundRobin,
    Unsupported(String),
}

impl LoadBalancerAlgorithm {
    /// Unknown names are kept as `Unsupported` rather than rejected.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "round_robin" | "round-robin" | "roundrobin" | "rr" => Self::RoundRobin,
            _ => Self::Unsupported(name.trim().to_string()),
        }
    }
}

impl fmt::Display for LoadBalancerAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundRobin => f.write_str("round_robin"),
            Self::Unsupported(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,

    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_strategy() -> String {
    "round_robin".to_string()
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_timeout_ms() -> u64 {
    2_000
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}
