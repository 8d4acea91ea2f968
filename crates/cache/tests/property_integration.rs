//! Property tests for cache invariants
//!
//! Random operation sequences must never break the capacity limits, the
//! agreement between stored entries and policy state, or the running
//! cost/size totals.

use std::time::Duration;

use proptest::prelude::*;
use stowage_cache::policy::optimal::{replay, OptimalPolicy};
use stowage_cache::policy::{self, LandlordPolicy};
use stowage_cache::{
    Attributes, CacheApi, CacheBuilder, CacheConfig, EvictionPolicy, LocalCache, MockClock,
    ReplacementPolicy, Weight,
};

#[derive(Debug, Clone)]
enum Op {
    Put { key: u8, cost: u8, size: u8 },
    Get(u8),
    Remove(u8),
    Touch(u8),
    Advance(u8),
    Evict(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (any::<u8>(), 0u8..20, 0u8..10)
            .prop_map(|(key, cost, size)| Op::Put { key: key % 32, cost, size }),
        3 => any::<u8>().prop_map(|key| Op::Get(key % 32)),
        1 => any::<u8>().prop_map(|key| Op::Remove(key % 32)),
        1 => any::<u8>().prop_map(|key| Op::Touch(key % 32)),
        1 => (0u8..50).prop_map(Op::Advance),
        1 => (0u8..4).prop_map(Op::Evict),
    ]
}

fn policy_strategy() -> impl Strategy<Value = EvictionPolicy> {
    prop_oneof![
        Just(EvictionPolicy::Lru),
        Just(EvictionPolicy::Fifo),
        Just(EvictionPolicy::Lfu),
        Just(EvictionPolicy::Landlord),
    ]
}

fn apply(cache: &LocalCache<u8, u32, MockClock>, clock: &MockClock, op: &Op) {
    match *op {
        Op::Put { key, cost, size } => {
            let attributes =
                Attributes::new().with_cost(f64::from(cost)).with_size(i64::from(size));
            cache.put_with(key, u32::from(key), attributes).unwrap();
        }
        Op::Get(key) => {
            cache.get(&key).unwrap();
        }
        Op::Remove(key) => {
            cache.remove(&key).unwrap();
        }
        Op::Touch(key) => {
            cache.touch(&key).unwrap();
        }
        Op::Advance(millis) => clock.advance_millis(u64::from(millis)),
        Op::Evict(count) => {
            cache.evict(usize::from(count)).unwrap();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: every limit holds after every operation, and the policy
    /// tracks exactly the stored keys.
    #[test]
    fn prop_limits_and_bookkeeping_hold(
        kind in policy_strategy(),
        max_entries in 1usize..12,
        max_total_size in 5i64..40,
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let clock = MockClock::new();
        let config = CacheConfig::builder()
            .max_entries(max_entries)
            .max_total_size(max_total_size)
            .max_total_cost(60.0)
            .eviction_policy(kind)
            .ttl(Duration::from_millis(120))
            .build();
        let cache =
            CacheBuilder::<u8, u32>::new(config).clock(clock.clone()).build_local().unwrap();

        for op in &ops {
            apply(&cache, &clock, op);
            let stats = cache.stats();
            prop_assert!(cache.len() <= max_entries);
            prop_assert!(stats.total_size <= max_total_size);
            prop_assert!(stats.total_cost <= 60.0);
            prop_assert!(cache.is_consistent(), "inconsistent after {:?}", op);
        }
    }

    /// Property: Landlord credits never go negative.
    #[test]
    fn prop_landlord_credits_stay_non_negative(
        ops in prop::collection::vec((any::<u8>(), 0u8..30, 1u8..10, any::<bool>()), 1..150),
    ) {
        let mut landlord = LandlordPolicy::new();
        for (key, cost, size, evict) in ops {
            let key = key % 16;
            if landlord.contains(&key) {
                landlord.touch(&key).unwrap();
            } else {
                landlord.add(key, Weight { cost: f64::from(cost), size: i64::from(size) }).unwrap();
            }
            if evict {
                landlord.evict_next().unwrap();
            }
            prop_assert!(landlord.credits().all(|(_, credit)| credit >= 0.0));
        }
    }

    /// Property: no online policy produces fewer misses than the optimum.
    #[test]
    fn prop_optimal_is_a_lower_bound_on_misses(
        kind in policy_strategy(),
        capacity in 1usize..6,
        trace in prop::collection::vec(0u8..10, 1..120),
    ) {
        let mut optimal = OptimalPolicy::new(capacity);
        optimal.access(trace.iter().copied());
        prop_assert_eq!(optimal.hits() + optimal.misses(), trace.len());

        let mut online = policy::for_kind::<u8>(kind);
        let outcome = replay(online.as_mut(), &trace, capacity).unwrap();
        prop_assert!(outcome.misses >= optimal.misses());
    }
}
