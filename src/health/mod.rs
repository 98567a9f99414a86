// src/health/mod.rs
mod checker;
mod prober;

pub use checker::{HealthCheckSummary, HealthChecker};
pub use prober::probe;
