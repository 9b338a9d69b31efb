use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    cache::Cache,
    io::Response,
    log_debug,
    time::{Clock, Seconds, SystemClock},
    Result,
};

/// Idle window after which an untouched entry is dropped.
pub const DEFAULT_IDLE: Seconds = Seconds::new(300);

struct Slot<V> {
    value: V,
    touched: Seconds,
}

impl<V> Slot<V> {
    fn expired(&self, now: Seconds, idle: Seconds) -> bool {
        now - self.touched >= idle
    }
}

/// Concurrent store whose entries expire after an idle window with no
/// access. Expiry is lazy: it is checked when a key is read, and an insert
/// sweeps expired entries at most once per idle window. There is no
/// background thread.
pub struct ExpiringCache<K, V = Response> {
    entries: DashMap<K, Slot<V>>,
    idle: Seconds,
    clock: Arc<dyn Clock>,
    // Epoch seconds of the last sweep.
    swept: AtomicU64,
}

impl<K: Eq + Hash, V: Clone> ExpiringCache<K, V> {
    pub fn new(idle: Seconds) -> Self {
        Self::with_clock(idle, Arc::new(SystemClock))
    }

    pub fn with_clock(idle: Seconds, clock: Arc<dyn Clock>) -> Self {
        let swept = AtomicU64::new(*clock.now());
        ExpiringCache {
            entries: DashMap::new(),
            idle,
            clock,
            swept,
        }
    }

    pub fn idle(&self) -> Seconds {
        self.idle
    }

    /// Returns a live entry and restarts its idle window.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        match self.entries.get_mut(key) {
            Some(mut slot) if !slot.expired(now, self.idle) => {
                slot.touched = now;
                return Some(slot.value.clone());
            }
            Some(_) => {}
            None => return None,
        }
        // Only remove if no writer refreshed the slot in between.
        if self
            .entries
            .remove_if(key, |_, slot| slot.expired(now, self.idle))
            .is_some()
        {
            log_debug!("Expired cache entry after {} idle seconds", self.idle);
        }
        None
    }

    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        self.sweep(now);
        self.entries.insert(
            key,
            Slot {
                value,
                touched: now,
            },
        );
    }

    fn sweep(&self, now: Seconds) {
        let swept = self.swept.load(Ordering::Acquire);
        if now - Seconds::new(swept) < self.idle {
            return;
        }
        // One caller wins the window, the others skip.
        if self
            .swept
            .compare_exchange(swept, *now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let idle = self.idle;
            self.entries.retain(|_, slot| !slot.expired(now, idle));
        }
    }

    pub fn remove(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries held, expired ones included until they are swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Cache<K> for ExpiringCache<K, Response> {
    fn get(&self, key: &K) -> Result<Option<Response>> {
        Ok(ExpiringCache::get(self, key))
    }

    fn set(&self, key: &K, value: &Response) -> Result<()> {
        self.insert(key.clone(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<()> {
        ExpiringCache::remove(self, key);
        Ok(())
    }

    fn invalidate(&self) -> Result<()> {
        self.clear();
        Ok(())
    }
}
