// src/load_balancer/mod.rs
mod algorithm;
mod balancer;
mod round_robin;

pub use algorithm::Selector;
pub use balancer::{BackendSet, LoadBalancer, LoadBalancerBuilder, SharedBackendSet};
pub use round_robin::RoundRobin;
pub use crate::config::LoadBalancerAlgorithm;

use std::sync::Arc;

pub fn create_selector(algorithm: &LoadBalancerAlgorithm) -> Arc<dyn Selector> {
    match algorithm {
        LoadBalancerAlgorithm::RoundRobin => Arc::new(RoundRobin::new()),
        LoadBalancerAlgorithm::Unsupported(name) => {
            tracing::warn!(
                "Unsupported load balancing algorithm {:?}, falling back to round robin",
                name
            );
            Arc::new(RoundRobin::new())
        }
    }
}
