//! Caller-owned cache with a time-to-live, for expensive report checks.
//!
//! The clock is injectable so freshness can be tested without sleeping.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

#[derive(Debug)]
struct Slot<V> {
    value: V,
    stored_at: Instant,
}

/// Entries are fresh while `now - stored_at < ttl`. Stale entries stay in
/// the map until overwritten or invalidated.
#[derive(Debug)]
pub struct TtlCache<K, V, C = SystemClock> {
    ttl: Duration,
    clock: C,
    entries: HashMap<K, Slot<V>>,
}

impl<K: Eq + Hash, V> TtlCache<K, V, SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<K: Eq + Hash, V, C: Clock> TtlCache<K, V, C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            ttl,
            clock,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, slot: &Slot<V>, now: Instant) -> bool {
        now.saturating_duration_since(slot.stored_at) < self.ttl
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let now = self.clock.now();
        let slot = self.entries.get(key)?;
        if self.is_fresh(slot, now) {
            Some(&slot.value)
        } else {
            None
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        let stored_at = self.clock.now();
        self.entries.insert(key, Slot { value, stored_at });
    }

    /// Return the cached value, recomputing it with `f` when missing or stale.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, f: F) -> &V {
        let now = self.clock.now();
        let ttl = self.ttl;
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if now.saturating_duration_since(occupied.get().stored_at) >= ttl {
                    debug!("cache entry stale, refreshing");
                    occupied.insert(Slot {
                        value: f(),
                        stored_at: now,
                    });
                }
                &occupied.into_mut().value
            }
            Entry::Vacant(vacant) => {
                debug!("cache miss");
                &vacant
                    .insert(Slot {
                        value: f(),
                        stored_at: now,
                    })
                    .value
            }
        }
    }

    pub fn invalidate(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|slot| slot.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) struct ManualClock(std::cell::Cell<Instant>);

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new() -> Self {
        Self(std::cell::Cell::new(Instant::now()))
    }

    pub(crate) fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.0.get()
    }
}
