//! Result cache

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// How a blocking [`ThreadSafeMap::wait_take`] ended
#[derive(Debug, PartialEq, Eq)]
pub enum Waited<V> {
    /// The entry appeared and was taken
    Value(V),
    /// Waiters were released before the entry appeared
    Released,
    /// The timeout elapsed first
    TimedOut,
}

/// Concurrent key-value store with peek and take-once reads.
///
/// Entries sit behind an `RwLock`, so peeks and membership checks share the
/// lock while inserts and takes are exclusive. Blocking waiters park on one
/// condvar shared by all keys; every insert wakes them and each re-checks
/// its own key.
pub struct ThreadSafeMap<K, V> {
    entries: RwLock<HashMap<K, V>>,
    released: Mutex<bool>,
    changed: Condvar,
}

impl<K: Eq + Hash, V> ThreadSafeMap<K, V> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            released: Mutex::new(false),
            changed: Condvar::new(),
        }
    }

    fn released(&self) -> MutexGuard<'_, bool> {
        self.released.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert if absent. Returns `false` and keeps the existing value on a
    /// duplicate key.
    pub fn insert(&self, key: K, value: V) -> bool {
        let inserted = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            match entries.entry(key) {
                std::collections::hash_map::Entry::Occupied(_) => false,
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(value);
                    true
                }
            }
        };

        if inserted {
            // Taking the signal lock orders this insert against a waiter
            // that has checked the map but not parked yet.
            let _signal = self.released();
            self.changed.notify_all();
        }
        inserted
    }

    /// Peek at a value, leaving it in place
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    /// Remove and return a value
    pub fn take(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key)
    }

    /// Check if a key is present
    pub fn contains(&self, key: &K) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until `key` is present and take it.
    ///
    /// Returns early with [`Waited::Released`] once
    /// [`release_waiters`](Self::release_waiters) has been called and the key
    /// is still missing, or with [`Waited::TimedOut`] when `timeout` elapses.
    pub fn wait_take(&self, key: &K, timeout: Option<Duration>) -> Waited<V> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut released = self.released();
        loop {
            if let Some(value) = self.take(key) {
                return Waited::Value(value);
            }
            if *released {
                return Waited::Released;
            }
            released = match deadline {
                None => self
                    .changed
                    .wait(released)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Waited::TimedOut;
                    }
                    self.changed
                        .wait_timeout(released, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Wake every blocked waiter; waiters whose key is missing return
    /// [`Waited::Released`]. Idempotent.
    pub fn release_waiters(&self) {
        *self.released() = true;
        self.changed.notify_all();
    }

    /// Check if waiters have been released
    pub fn is_released(&self) -> bool {
        *self.released()
    }
}

impl<K: Eq + Hash, V> Default for ThreadSafeMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_insert_ignores_duplicates() {
        let map = ThreadSafeMap::new();
        assert!(map.insert(1, "first"));
        assert!(!map.insert(1, "second"));
        assert_eq!(map.get(&1), Some("first"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_peek_and_take() {
        let map = ThreadSafeMap::new();
        map.insert("k", 10);

        assert_eq!(map.get(&"k"), Some(10));
        assert_eq!(map.get(&"k"), Some(10));
        assert!(map.contains(&"k"));

        assert_eq!(map.take(&"k"), Some(10));
        assert_eq!(map.take(&"k"), None);
        assert!(!map.contains(&"k"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_wait_take_wakes_on_insert() {
        let map = Arc::new(ThreadSafeMap::new());
        let waiter = {
            let map = Arc::clone(&map);
            thread::spawn(move || map.wait_take(&3u64, None))
        };

        thread::sleep(Duration::from_millis(20));
        map.insert(1, "other");
        map.insert(3, "mine");

        assert_eq!(waiter.join().unwrap(), Waited::Value("mine"));
        assert!(map.contains(&1));
    }

    #[test]
    fn test_release_unblocks_waiters() {
        let map: Arc<ThreadSafeMap<u64, u64>> = Arc::new(ThreadSafeMap::new());
        let waiters: Vec<_> = (0..4)
            .map(|key| {
                let map = Arc::clone(&map);
                thread::spawn(move || map.wait_take(&key, None))
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        map.release_waiters();
        map.release_waiters();

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), Waited::Released);
        }
    }

    #[test]
    fn test_released_map_still_returns_present_values() {
        let map = ThreadSafeMap::new();
        map.insert(5, 25);
        map.release_waiters();
        assert_eq!(map.wait_take(&5, None), Waited::Value(25));
        assert_eq!(map.wait_take(&5, None), Waited::Released);
    }

    #[test]
    fn test_wait_take_times_out() {
        let map: ThreadSafeMap<u8, u8> = ThreadSafeMap::new();
        assert_eq!(
            map.wait_take(&1, Some(Duration::from_millis(20))),
            Waited::TimedOut
        );
    }
}
