// tests/round_robin_props.rs
use hotswap_lb::load_balancer::{RoundRobin, Selector};
use hotswap_lb::proxy::{build_client, Backend};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

fn backends(alive: &[bool]) -> Vec<Arc<Backend>> {
    let client = build_client();
    alive
        .iter()
        .enumerate()
        .map(|(i, &up)| {
            let raw = format!("http://127.0.0.1:{}", 10_000 + i);
            let backend = Backend::parse(&raw, client.clone()).unwrap();
            backend.set_alive(up);
            Arc::new(backend)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn picks_something_while_any_backend_is_alive(
        alive in prop::collection::vec(any::<bool>(), 1..12),
        cursor in any::<usize>(),
        calls in 1usize..50,
    ) {
        prop_assume!(alive.iter().any(|&up| up));

        let set = backends(&alive);
        let selector = RoundRobin::starting_at(cursor);
        for _ in 0..calls {
            let picked = selector.select(&set);
            prop_assert!(picked.map(|b| b.is_alive()).unwrap_or(false));
        }
    }

    #[test]
    fn picks_nothing_when_all_are_dead(
        len in 0usize..12,
        cursor in any::<usize>(),
    ) {
        let set = backends(&vec![false; len]);
        let selector = RoundRobin::starting_at(cursor);
        prop_assert!(selector.select(&set).is_none());
        prop_assert!(selector.select(&set).is_none());
    }

    #[test]
    fn all_alive_rotation_is_fair(
        len in 1usize..10,
        laps in 1usize..6,
        cursor in 0usize..1_000_000,
    ) {
        let set = backends(&vec![true; len]);
        let selector = RoundRobin::starting_at(cursor);

        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..len * laps {
            let backend = selector.select(&set).unwrap();
            *counts.entry(backend.address().to_string()).or_default() += 1;
        }

        prop_assert_eq!(counts.len(), len);
        prop_assert!(counts.values().all(|&n| n == laps));
    }

    #[test]
    fn shrinking_the_set_stays_in_range(
        before in 1usize..12,
        after in 1usize..12,
        warmup in 0usize..30,
    ) {
        let selector = RoundRobin::new();
        let old = backends(&vec![true; before]);
        for _ in 0..warmup {
            selector.select(&old);
        }

        let new = backends(&vec![true; after]);
        for _ in 0..after * 2 {
            let picked = selector.select(&new).unwrap();
            prop_assert!(new.iter().any(|b| Arc::ptr_eq(b, &picked)));
        }
    }
}
