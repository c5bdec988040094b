//! Bounded least-recently-used map of chapter text.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

struct Slot {
    text: Arc<str>,
    last_used: u64,
}

/// LRU map from a key to an immutable text body.
///
/// Recency is tracked with a logical clock; eviction scans for the
/// oldest slot, which is fine for the few hundred chapters a reader keeps.
pub(crate) struct LruCache<K> {
    slots: HashMap<K, Slot>,
    capacity: usize,
    clock: u64,
    bytes: usize,
}

impl<K: Eq + Hash + Clone> LruCache<K> {
    /// Creates a cache holding at most `capacity` entries (minimum one).
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
            bytes: 0,
        }
    }

    /// Returns the text for `key` and marks it as most recently used.
    pub(crate) fn get(&mut self, key: &K) -> Option<Arc<str>> {
        self.clock += 1;
        let clock = self.clock;
        self.slots.get_mut(key).map(|slot| {
            slot.last_used = clock;
            slot.text.clone()
        })
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Inserts an entry, evicting least recently used entries to stay
    /// within capacity. Returns the number of evicted entries.
    ///
    /// An existing entry keeps its original text.
    pub(crate) fn insert(&mut self, key: K, text: Arc<str>) -> usize {
        self.clock += 1;
        if let Some(slot) = self.slots.get_mut(&key) {
            slot.last_used = self.clock;
            return 0;
        }

        let mut evicted = 0;
        while self.slots.len() >= self.capacity {
            let Some(oldest) = self
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            self.remove(&oldest);
            evicted += 1;
        }

        self.bytes += text.len();
        self.slots.insert(
            key,
            Slot {
                text,
                last_used: self.clock,
            },
        );
        evicted
    }

    /// Removes every entry matching `predicate`. Returns how many were removed.
    pub(crate) fn remove_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let doomed: Vec<K> = self.slots.keys().filter(|k| predicate(k)).cloned().collect();
        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.bytes = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total size of the cached text in bytes.
    pub(crate) fn bytes(&self) -> usize {
        self.bytes
    }

    fn remove(&mut self, key: &K) {
        if let Some(slot) = self.slots.remove(key) {
            self.bytes -= slot.text.len();
        }
    }
}
