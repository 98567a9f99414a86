// src/load_balancer/round_robin.rs
use crate::load_balancer::Selector;
use crate::proxy::Backend;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Round robin over the alive members of the set.
///
/// The cursor is never reset. After a skip it jumps to the backend that was
/// picked, so a run of dead backends is not rescanned on every call. Two
/// racing skips may both store, which can move the cursor backwards; the
/// index is always taken modulo the current length so this only costs
/// fairness.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start rotating from `cursor`; the first pick lands on `cursor + 1`.
    pub fn starting_at(cursor: usize) -> Self {
        Self {
            cursor: AtomicUsize::new(cursor),
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

impl Selector for RoundRobin {
    fn select(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        let len = backends.len();
        if len == 0 {
            return None;
        }

        let next = self.cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let start = next % len;

        for offset in 0..len {
            let index = (start + offset) % len;
            let backend = &backends[index];

            if backend.is_alive() {
                if offset != 0 {
                    self.cursor.store(index, Ordering::Relaxed);
                }
                return Some(Arc::clone(backend));
            }
        }

        None
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::build_client;

    fn backends(n: usize) -> Vec<Arc<Backend>> {
        let client = build_client();
        (0..n)
            .map(|i| {
                let raw = format!("http://127.0.0.1:{}", 9001 + i);
                Arc::new(Backend::parse(&raw, client.clone()).unwrap())
            })
            .collect()
    }

    fn port(backend: &Backend) -> u16 {
        backend.url().port().unwrap()
    }

    #[test]
    fn test_empty_set_selects_nothing() {
        let rr = RoundRobin::new();
        assert!(rr.select(&[]).is_none());
        assert!(rr.select(&[]).is_none());
    }

    #[test]
    fn test_rotation_order() {
        let set = backends(3);
        let rr = RoundRobin::starting_at(2);

        let picked: Vec<u16> = (0..6).map(|_| port(&rr.select(&set).unwrap())).collect();
        assert_eq!(picked, vec![9001, 9002, 9003, 9001, 9002, 9003]);
    }

    #[test]
    fn test_even_distribution() {
        let set = backends(4);
        let rr = RoundRobin::new();
        let mut counts = [0usize; 4];

        for _ in 0..40 {
            let picked = rr.select(&set).unwrap();
            counts[usize::from(port(&picked) - 9001)] += 1;
        }

        assert_eq!(counts, [10, 10, 10, 10]);
    }

    #[test]
    fn test_skips_dead_backend_and_moves_cursor() {
        let set = backends(3);
        set[1].set_alive(false);
        // next pick would be index 1
        let rr = RoundRobin::starting_at(0);

        let picked = rr.select(&set).unwrap();
        assert_eq!(port(&picked), 9003);
        assert_eq!(rr.cursor(), 2);

        let picked: Vec<u16> = (0..4).map(|_| port(&rr.select(&set).unwrap())).collect();
        assert!(!picked.contains(&9002));

        set[1].set_alive(true);
        let picked: Vec<u16> = (0..3).map(|_| port(&rr.select(&set).unwrap())).collect();
        assert!(picked.contains(&9002));
    }

    #[test]
    fn test_all_dead_returns_none() {
        let set = backends(5);
        for backend in &set {
            backend.set_alive(false);
        }

        let rr = RoundRobin::new();
        assert!(rr.select(&set).is_none());
        // the scan is bounded to one lap: the cursor advanced exactly once
        assert_eq!(rr.cursor(), 1);
    }

    #[test]
    fn test_cursor_wraps_at_usize_max() {
        let set = backends(3);
        let rr = RoundRobin::starting_at(usize::MAX);

        // usize::MAX + 1 wraps to 0
        assert_eq!(port(&rr.select(&set).unwrap()), 9001);
        assert_eq!(port(&rr.select(&set).unwrap()), 9002);
    }

    #[test]
    fn test_shrunken_set_stays_in_range() {
        let big = backends(10);
        let rr = RoundRobin::starting_at(8);
        rr.select(&big).unwrap();

        let small = backends(2);
        for _ in 0..5 {
            let picked = rr.select(&small).unwrap();
            assert!(port(&picked) == 9001 || port(&picked) == 9002);
        }
    }

    #[test]
    fn test_concurrent_selection_never_fails() {
        let set = backends(3);
        set[0].set_alive(false);
        let rr = RoundRobin::new();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..1_000 {
                        let picked = rr.select(&set).unwrap();
                        assert_ne!(port(&picked), 9001);
                    }
                });
            }
        });
    }
}
