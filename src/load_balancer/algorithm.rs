// src/load_balancer/algorithm.rs
use crate::proxy::Backend;
use std::sync::Arc;

/// Picks the next backend out of the current set.
pub trait Selector: Send + Sync {
    /// Returns `None` when the set is empty or nothing in it is alive.
    fn select(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;

    fn name(&self) -> &'static str;
}
