use hostguard_collector::parse_session_listing;
use hostguard_core::TtlCache;
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    /// Parsing is total and deterministic: any input yields some set of
    /// records without panicking, and parsing twice yields the same set.
    #[test]
    fn session_parsing_is_total_and_deterministic(input in ".{0,400}") {
        let first = parse_session_listing("rds-01", &input);
        let second = parse_session_listing("rds-01", &input);
        prop_assert_eq!(first, second);
    }

    /// Every parsed record is attributed to the host that was queried.
    #[test]
    fn parsed_records_carry_the_host(input in ".{0,400}") {
        for record in parse_session_listing("rds-07", &input) {
            prop_assert_eq!(record.host.as_str(), "rds-07");
        }
    }

    /// Round-trip law: a get before the TTL elapses, with no intervening
    /// insert for that key, returns exactly the last stored value.
    #[test]
    fn cache_round_trip_before_expiry(entries in proptest::collection::vec(("[a-z]{1,8}", any::<u32>()), 1..20)) {
        let mut cache = TtlCache::new(64);
        for (key, value) in &entries {
            cache.insert(key.clone(), *value, Duration::from_secs(60));
        }
        for (key, _) in &entries {
            if let Some(stored) = cache.get(key) {
                let last_written = entries
                    .iter()
                    .rev()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| *v)
                    .expect("key was inserted");
                prop_assert_eq!(*stored, last_written);
            }
        }
    }

    /// The cache never exceeds its capacity, and the most recent insertion
    /// always survives.
    #[test]
    fn cache_capacity_keeps_newest_insertions(keys in proptest::collection::vec("[a-z]{1,6}", 1..40)) {
        let capacity = 4usize;
        let mut cache = TtlCache::new(capacity);
        for (i, key) in keys.iter().enumerate() {
            cache.insert(key.clone(), i, Duration::from_secs(60));
        }
        prop_assert!(cache.len() <= capacity);

        let last = keys.last().expect("non-empty");
        prop_assert!(cache.get(last).is_some());
    }
}
