//! Idle-expiring state keyed by segment key.
//!
//! The form rotation and the field-test occurrence counters are shared by
//! every exam being opened. Each key's value carries its own synchronization,
//! so the map lock is held only long enough to find or insert an entry and
//! unrelated keys never contend on it.

use chrono::Duration;
use proctor_core::clock::Clock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

/// Default idle window before an entry is evicted.
pub const DEFAULT_IDLE_TTL_HOURS: i64 = 24;

struct Slot<V> {
    value: Arc<V>,
    /// Milliseconds since the epoch of the last access.
    last_access: AtomicI64,
}

/// A map from key to shared state that forgets keys left idle too long.
///
/// Losing an entry only resets the heuristic it holds; callers must treat a
/// fresh value as a valid state.
pub struct KeyedCache<V> {
    idle_ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, Slot<V>>>,
}

impl<V> KeyedCache<V> {
    pub fn new(idle_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            idle_ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The value for `key` if present and not idle past the TTL.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let now = self.now_millis();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let slot = entries.get(key)?;
        if self.is_expired(slot, now) {
            return None;
        }
        slot.last_access.store(now, Ordering::Relaxed);
        Some(Arc::clone(&slot.value))
    }

    /// The value for `key`, inserting `init()` if absent or expired.
    pub fn get_or_insert_with(&self, key: &str, init: impl FnOnce() -> V) -> Arc<V> {
        if let Some(value) = self.get(key) {
            return value;
        }

        let now = self.now_millis();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        // Sweep idle entries while we hold the write lock
        entries.retain(|_, slot| !self.is_expired(slot, now));

        // Another caller may have inserted between our read and write locks
        let slot = entries.entry(key.to_string()).or_insert_with(|| Slot {
            value: Arc::new(init()),
            last_access: AtomicI64::new(now),
        });
        slot.last_access.store(now, Ordering::Relaxed);
        Arc::clone(&slot.value)
    }

    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key).is_some()
    }

    /// Number of entries, including any not yet swept.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn is_expired(&self, slot: &Slot<V>, now: i64) -> bool {
        now - slot.last_access.load(Ordering::Relaxed) >= self.idle_ttl.num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proctor_core::clock::FixedClock;
    use std::sync::atomic::AtomicUsize;

    fn cache(clock: Arc<FixedClock>) -> KeyedCache<AtomicUsize> {
        KeyedCache::new(Duration::hours(DEFAULT_IDLE_TTL_HOURS), clock)
    }

    #[test]
    fn insert_once_then_reuse() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let cache = cache(clock);

        let first = cache.get_or_insert_with("SEG-1", || AtomicUsize::new(7));
        first.store(8, Ordering::SeqCst);
        let second = cache.get_or_insert_with("SEG-1", || AtomicUsize::new(0));
        assert_eq!(second.load(Ordering::SeqCst), 8);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn idle_entries_expire() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let cache = cache(clock.clone());

        cache.get_or_insert_with("SEG-1", || AtomicUsize::new(3));
        clock.advance(Duration::hours(23));
        assert!(cache.get("SEG-1").is_some());

        // The read above counts as access, so the entry lives another 24h
        clock.advance(Duration::hours(23));
        assert!(cache.get("SEG-1").is_some());

        clock.advance(Duration::hours(24));
        assert!(cache.get("SEG-1").is_none());
        let fresh = cache.get_or_insert_with("SEG-1", || AtomicUsize::new(0));
        assert_eq!(fresh.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn expired_entries_are_swept_on_insert() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let cache = cache(clock.clone());

        cache.get_or_insert_with("SEG-1", || AtomicUsize::new(1));
        cache.get_or_insert_with("SEG-2", || AtomicUsize::new(1));
        clock.advance(Duration::hours(25));
        cache.get_or_insert_with("SEG-3", || AtomicUsize::new(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn remove_forgets_key() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let cache = cache(clock);
        cache.get_or_insert_with("SEG-1", || AtomicUsize::new(1));
        assert!(cache.remove("SEG-1"));
        assert!(!cache.remove("SEG-1"));
        assert!(cache.is_empty());
    }
}
