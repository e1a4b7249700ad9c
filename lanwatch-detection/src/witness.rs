//! ## lanwatch-detection::witness
//! Bounded key → distinct-value sightings with expiry.
//!
//! Used for "which macs claimed this ip" and "which ips came from this mac".
//! Values not seen again within the ttl stop counting. When the table is
//! full the key with the oldest sighting goes; when a key's set is full its
//! oldest value goes.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug)]
struct WitnessSet<V> {
    /// Insertion order is preserved so descriptions read oldest first.
    values: Vec<(V, DateTime<Utc>)>,
    last_seen: DateTime<Utc>,
}

impl<V: PartialEq> WitnessSet<V> {
    fn expire(&mut self, cutoff: DateTime<Utc>) {
        self.values.retain(|(_, seen)| *seen > cutoff);
    }

    fn evict_oldest(&mut self) {
        if let Some(idx) = self
            .values
            .iter()
            .enumerate()
            .min_by_key(|(_, (_, seen))| *seen)
            .map(|(idx, _)| idx)
        {
            self.values.remove(idx);
        }
    }
}

#[derive(Debug)]
pub struct WitnessTable<K, V> {
    entries: HashMap<K, WitnessSet<V>>,
    ttl: TimeDelta,
    max_keys: usize,
    max_per_key: usize,
}

impl<K, V> WitnessTable<K, V>
where
    K: Eq + Hash + Clone,
    V: PartialEq + Clone,
{
    pub fn new(ttl: TimeDelta, max_keys: usize, max_per_key: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_keys: max_keys.max(1),
            max_per_key: max_per_key.max(1),
        }
    }

    /// Records that `value` was seen for `key` and returns how many distinct
    /// live values the key now has.
    pub fn record(&mut self, key: K, value: V, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.ttl;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_keys {
            self.make_room(cutoff);
        }

        let set = self.entries.entry(key).or_insert_with(|| WitnessSet {
            values: Vec::new(),
            last_seen: now,
        });
        set.expire(cutoff);
        match set.values.iter_mut().find(|(v, _)| *v == value) {
            Some((_, seen)) => *seen = (*seen).max(now),
            None => {
                set.values.push((value, now));
                if set.values.len() > self.max_per_key {
                    set.evict_oldest();
                }
            }
        }
        set.last_seen = set.last_seen.max(now);
        set.values.len()
    }

    /// Live values for `key`, oldest first.
    pub fn witnesses(&self, key: &K) -> Vec<V> {
        self.entries
            .get(key)
            .map(|set| set.values.iter().map(|(v, _)| v.clone()).collect())
            .unwrap_or_default()
    }

    /// Drops every value older than the ttl and every key left empty.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, set| {
            set.expire(cutoff);
            !set.values.is_empty()
        });
        before - self.entries.len()
    }

    fn make_room(&mut self, cutoff: DateTime<Utc>) {
        self.entries.retain(|_, set| set.last_seen > cutoff);
        if self.entries.len() < self.max_keys {
            return;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, set)| set.last_seen)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn table() -> WitnessTable<&'static str, u8> {
        WitnessTable::new(TimeDelta::seconds(100), 4, 3)
    }

    #[test]
    fn counts_distinct_values() {
        let mut t = table();
        assert_eq!(t.record("ip", 1, at(0)), 1);
        assert_eq!(t.record("ip", 1, at(1)), 1);
        assert_eq!(t.record("ip", 2, at(2)), 2);
        assert_eq!(t.witnesses(&"ip"), vec![1, 2]);
        assert!(t.witnesses(&"other").is_empty());
    }

    #[test]
    fn expired_values_stop_counting() {
        let mut t = table();
        t.record("ip", 1, at(0));
        t.record("ip", 2, at(50));
        assert_eq!(t.record("ip", 3, at(120)), 2);
        assert_eq!(t.witnesses(&"ip"), vec![2, 3]);
    }

    #[test]
    fn refreshed_values_survive() {
        let mut t = table();
        t.record("ip", 1, at(0));
        t.record("ip", 1, at(90));
        assert_eq!(t.record("ip", 2, at(150)), 2);
    }

    #[test]
    fn full_set_evicts_oldest_value() {
        let mut t = table();
        for (i, v) in [1u8, 2, 3, 4].into_iter().enumerate() {
            t.record("ip", v, at(i as i64));
        }
        assert_eq!(t.witnesses(&"ip"), vec![2, 3, 4]);
    }

    #[test]
    fn full_table_evicts_stalest_key() {
        let mut t = table();
        for (i, k) in ["a", "b", "c", "d"].into_iter().enumerate() {
            t.record(k, 1, at(i as i64));
        }
        t.record("a", 2, at(10));
        t.record("e", 1, at(11));
        assert_eq!(t.len(), 4);
        assert!(t.witnesses(&"b").is_empty());
        assert_eq!(t.witnesses(&"a"), vec![1, 2]);
    }

    #[test]
    fn purge_drops_empty_keys() {
        let mut t = table();
        t.record("a", 1, at(0));
        t.record("b", 1, at(80));
        assert_eq!(t.purge_expired(at(150)), 1);
        assert_eq!(t.len(), 1);
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(ops in proptest::collection::vec((0u8..32, 0u8..32, 0i64..500), 1..300)) {
            let mut t: WitnessTable<u8, u8> = WitnessTable::new(TimeDelta::seconds(60), 8, 4);
            let mut clock = 0;
            for (key, value, step) in ops {
                clock += step;
                let distinct = t.record(key, value, at(clock));
                prop_assert!(distinct >= 1 && distinct <= 4);
                prop_assert!(t.len() <= 8);
                prop_assert!(t.witnesses(&key).contains(&value));
            }
        }
    }
}
