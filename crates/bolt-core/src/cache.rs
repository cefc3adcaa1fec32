//! Bounded least-recently-used cache shared across pipeline runs.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;

use crate::inventory::InventoryRecord;

struct LruState<K, V> {
    map: HashMap<K, V>,
    order: VecDeque<K>,
}

/// Thread-safe LRU map. When full, inserting evicts the entry that was read
/// or written least recently.
///
/// The lock is held only for the map operation itself; callers compute
/// values outside of it.
pub struct LruCache<K, V> {
    capacity: usize,
    state: Mutex<LruState<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    /// `None` when `capacity` is zero, meaning caching is disabled.
    pub fn new(capacity: usize) -> Option<Self> {
        (capacity > 0).then(|| Self {
            capacity,
            state: Mutex::new(LruState {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.lock();
        let value = state.map.get(key).cloned()?;
        state.order.retain(|k| k != key);
        state.order.push_back(key.clone());
        Some(value)
    }

    pub fn insert(&self, key: K, value: V) {
        let mut state = self.lock();
        if state.map.insert(key.clone(), value).is_some() {
            state.order.retain(|k| k != &key);
        }
        state.order.push_back(key);
        while state.order.len() > self.capacity {
            if let Some(old) = state.order.pop_front() {
                state.map.remove(&old);
            }
        }
    }

    // A poisoned lock only means another run panicked mid-insert; the map
    // itself is still consistent.
    fn lock(&self) -> std::sync::MutexGuard<'_, LruState<K, V>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Inventory lookups keyed by SPK and organization tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InventoryKey {
    pub spk: String,
    pub org_tag: Option<String>,
}

pub type InventoryCache = LruCache<InventoryKey, Vec<InventoryRecord>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_disables() {
        assert!(LruCache::<u8, u8>::new(0).is_none());
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = LruCache::new(2).unwrap();
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.insert("c", 3);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reinsert_replaces_without_growing() {
        let cache = LruCache::new(2).unwrap();
        cache.insert("a", 1);
        cache.insert("a", 9);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a"), Some(9));
    }

    #[test]
    fn shared_across_threads() {
        let cache = std::sync::Arc::new(LruCache::new(8).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.insert(i, i * 10))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.get(&3), Some(30));
    }
}
