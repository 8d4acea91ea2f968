//! Integration tests for replacement policies
//!
//! Exercises each built-in policy directly and through a cache, plus the
//! offline optimal analysis.

use stowage_cache::policy::optimal::{hit_ratio_curve, replay, OptimalPolicy};
use stowage_cache::policy::{self, FifoPolicy, LandlordPolicy, LfuPolicy, LruPolicy};
use stowage_cache::{
    Attributes, CacheApi, CacheConfig, EvictionPolicy, LocalCache, PolicyError, ReplacementPolicy,
    Weight,
};

fn weight(cost: f64, size: i64) -> Weight {
    Weight { cost, size }
}

/// Verifies every built-in policy fails fast on misuse.
///
/// # Test Steps
/// 1. Evict from an empty policy
/// 2. Touch and remove an unknown key
/// 3. Add the same key twice
#[test]
fn test_policies_fail_fast_on_precondition_violations() {
    for kind in
        [EvictionPolicy::Lru, EvictionPolicy::Fifo, EvictionPolicy::Lfu, EvictionPolicy::Landlord]
    {
        let mut policy = policy::for_kind::<&str>(kind);
        assert_eq!(policy.evict_next(), Err(PolicyError::Empty), "{}", policy.name());
        assert_eq!(policy.touch(&"ghost"), Err(PolicyError::UnknownKey), "{}", policy.name());
        assert_eq!(policy.remove(&"ghost"), Err(PolicyError::UnknownKey), "{}", policy.name());

        policy.add("k", Weight::UNIT).unwrap();
        assert_eq!(
            policy.add("k", Weight::UNIT),
            Err(PolicyError::DuplicateKey),
            "{}",
            policy.name()
        );
        assert_eq!(policy.len(), 1);
    }
}

#[test]
fn test_lru_evicts_least_recently_touched() {
    let mut lru = LruPolicy::new();
    for key in ["a", "b", "c"] {
        lru.add(key, Weight::UNIT).unwrap();
    }
    lru.touch(&"a").unwrap();

    assert_eq!(lru.evict_next(), Ok("b"));
    assert_eq!(lru.evict_next(), Ok("c"));
    assert_eq!(lru.evict_next(), Ok("a"));
    assert!(lru.is_empty());
}

#[test]
fn test_fifo_ignores_accesses() {
    let mut fifo = FifoPolicy::new();
    fifo.add(1, Weight::UNIT).unwrap();
    fifo.add(2, Weight::UNIT).unwrap();
    fifo.touch(&1).unwrap();
    assert_eq!(fifo.evict_next(), Ok(1));
}

#[test]
fn test_lfu_prefers_frequent_keys() {
    let mut lfu = LfuPolicy::new();
    for key in ["hot", "warm", "cold"] {
        lfu.add(key, Weight::UNIT).unwrap();
    }
    for _ in 0..3 {
        lfu.touch(&"hot").unwrap();
    }
    lfu.touch(&"warm").unwrap();

    assert_eq!(lfu.evict_next(), Ok("cold"));
    assert_eq!(lfu.evict_next(), Ok("warm"));
    assert_eq!(lfu.frequency(&"hot"), Some(3));
}

/// Validates Landlord credit decay.
///
/// Assertions:
/// - Confirms the lowest cost/size density goes first.
/// - Confirms remaining credits never drop below zero after evictions.
/// - Confirms an access restores full credit.
#[test]
fn test_landlord_charges_rent_and_recredits() {
    let mut landlord = LandlordPolicy::new();
    landlord.add("cheap", weight(1.0, 4)).unwrap();
    landlord.add("dear", weight(12.0, 4)).unwrap();
    landlord.add("mid", weight(6.0, 4)).unwrap();

    assert_eq!(landlord.evict_next(), Ok("cheap"));
    assert!(landlord.credits().all(|(_, credit)| credit >= 0.0));
    assert_eq!(landlord.credit(&"mid"), Some(1.25));

    landlord.touch(&"mid").unwrap();
    assert_eq!(landlord.credit(&"mid"), Some(1.5));
    assert_eq!(landlord.evict_next(), Ok("mid"));
    assert_eq!(landlord.credit(&"dear"), Some(1.25));
}

#[test]
fn test_landlord_cache_keeps_valuable_entries() {
    let config = CacheConfig::builder()
        .max_total_size(100)
        .eviction_policy(EvictionPolicy::Landlord)
        .build();
    let cache: LocalCache<String, u8> = LocalCache::new(config).unwrap();

    cache.put_with("index".into(), 0, Attributes::new().with_size(40).with_cost(400.0)).unwrap();
    cache.put_with("log".into(), 0, Attributes::new().with_size(40).with_cost(4.0)).unwrap();
    cache.put_with("thumb".into(), 0, Attributes::new().with_size(40).with_cost(40.0)).unwrap();

    assert!(cache.contains_key(&"index".into()).unwrap());
    assert!(!cache.contains_key(&"log".into()).unwrap());
    assert!(cache.contains_key(&"thumb".into()).unwrap());
    assert_eq!(cache.stats().total_size, 80);
}

#[test]
fn test_optimal_analysis_with_string_keys() {
    let trace: Vec<&str> = "a b c a b d a b c d".split(' ').collect();
    let mut optimal = OptimalPolicy::new(3);
    optimal.access(trace.iter().copied());

    // At index 5 the newly arrived d is needed later than a, b and c.
    assert_eq!(optimal.evict_at(5), Some(&"d"));
    assert_eq!(optimal.hits(), 5);
    assert_eq!(optimal.misses(), 5);
    assert_eq!(optimal.capacity(), 3);
}

#[test]
fn test_hit_ratio_curve_is_non_decreasing() {
    let trace: Vec<u16> = (0..200u16).map(|i| (i * 7 + i / 3) % 23).collect();
    let curve = hit_ratio_curve(&trace, 12);

    assert_eq!(curve.len(), 12);
    assert!(curve.windows(2).all(|pair| pair[0] <= pair[1]));
}

/// Validates the optimal bound against every online policy.
///
/// Assertions:
/// - Confirms no online policy scores above the optimum.
#[test]
fn test_online_policies_never_beat_optimal() {
    let trace: Vec<u16> = (0..300u16).map(|i| (i * 13 + i / 5) % 17).collect();
    let mut optimal = OptimalPolicy::new(5);
    optimal.access(trace.iter().copied());

    for kind in
        [EvictionPolicy::Lru, EvictionPolicy::Fifo, EvictionPolicy::Lfu, EvictionPolicy::Landlord]
    {
        let mut online = policy::for_kind::<u16>(kind);
        let outcome = replay(online.as_mut(), &trace, 5).unwrap();
        assert!(outcome.misses >= optimal.misses(), "{kind:?}");
        assert!(outcome.score_against(&optimal) <= 1.0 + 1e-9, "{kind:?}");
    }
}
