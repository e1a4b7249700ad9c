//! ## lanwatch-detection::cooldown
//! Per-key alert suppression.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

/// Last emission time per dedup key.
///
/// Entries older than `retention` (the longest cooldown in use) can no
/// longer suppress anything and are pruned.
#[derive(Debug)]
pub struct CooldownTracker {
    last_emitted: HashMap<String, DateTime<Utc>>,
    retention: TimeDelta,
    max_keys: usize,
}

impl CooldownTracker {
    pub fn new(retention: TimeDelta, max_keys: usize) -> Self {
        Self {
            last_emitted: HashMap::new(),
            retention,
            max_keys: max_keys.max(1),
        }
    }

    /// Returns `true` and stamps the key if `cooldown` has elapsed since its
    /// last emission (or it never emitted). Returns `false` otherwise and
    /// leaves the stamp alone.
    pub fn try_acquire(&mut self, key: &str, cooldown: TimeDelta, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_emitted.get(key) {
            if now - *last < cooldown {
                return false;
            }
        }
        if !self.last_emitted.contains_key(key) && self.last_emitted.len() >= self.max_keys {
            self.prune(now);
            if self.last_emitted.len() >= self.max_keys {
                self.evict_oldest();
            }
        }
        self.last_emitted.insert(key.to_string(), now);
        true
    }

    pub fn last_emitted(&self, key: &str) -> Option<DateTime<Utc>> {
        self.last_emitted.get(key).copied()
    }

    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.last_emitted.len();
        let retention = self.retention;
        self.last_emitted.retain(|_, last| now - *last < retention);
        before - self.last_emitted.len()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .last_emitted
            .iter()
            .min_by_key(|(_, last)| **last)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            self.last_emitted.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.last_emitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_emitted.is_empty()
    }
}
