//! Shared bookkeeping for the cache store implementations.
//!
//! [`EntryMap`] keeps entries keyed by store key together with a recency
//! index. Every touch moves an entry to the back of the index, so the front
//! is always the least recently used entry and ties can't happen.

use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
pub(crate) struct Entry<V, M = ()> {
    pub value: V,
    pub pin: bool,
    /// Per-policy metadata (the expiry instant for TTL, nothing otherwise).
    pub meta: M,
    tick: u64,
}

#[derive(Debug)]
pub(crate) struct EntryMap<V, M = ()> {
    entries: HashMap<String, Entry<V, M>>,
    order: BTreeMap<u64, String>,
    next_tick: u64,
}

impl<V, M> Default for EntryMap<V, M> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_tick: 0,
        }
    }
}

impl<V, M> EntryMap<V, M> {
    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    pub fn get(&self, key: &str) -> Option<&Entry<V, M>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Mark `key` as most recently used.
    pub fn touch(&mut self, key: &str) {
        let tick = self.bump();
        if let Some(entry) = self.entries.get_mut(key) {
            self.order.remove(&entry.tick);
            entry.tick = tick;
            self.order.insert(tick, key.to_string());
        }
    }

    /// Insert or replace `key`, making it the most recently used entry.
    pub fn insert(&mut self, key: &str, value: V, pin: bool, meta: M) {
        let tick = self.bump();
        let entry = Entry {
            value,
            pin,
            meta,
            tick,
        };
        if let Some(old) = self.entries.insert(key.to_string(), entry) {
            self.order.remove(&old.tick);
        }
        self.order.insert(tick, key.to_string());
    }

    /// Remove `key` regardless of its pin.
    pub fn remove(&mut self, key: &str) -> Option<Entry<V, M>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.tick);
        Some(entry)
    }

    /// Remove `key` unless it is pinned. Returns whether it was removed.
    pub fn remove_unpinned(&mut self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) if !entry.pin => self.remove(key).is_some(),
            _ => false,
        }
    }

    pub fn set_pin(&mut self, key: &str, pin: bool) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.pin = pin;
        }
    }

    /// Least recently used entry that is not pinned.
    pub fn oldest_unpinned(&self) -> Option<String> {
        self.order
            .values()
            .find(|key| self.entries.get(*key).is_some_and(|e| !e.pin))
            .cloned()
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.order.values()
    }

    /// Keys (least recent first) whose entry matches `predicate`.
    pub fn keys_where(&self, predicate: impl Fn(&Entry<V, M>) -> bool) -> Vec<String> {
        self.order
            .values()
            .filter(|key| self.entries.get(*key).is_some_and(&predicate))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_moves_key_to_back() {
        let mut map: EntryMap<u32> = EntryMap::default();
        map.insert("a", 1, false, ());
        map.insert("b", 2, false, ());
        map.touch("a");

        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn reinsert_keeps_single_index_entry() {
        let mut map: EntryMap<u32> = EntryMap::default();
        map.insert("a", 1, false, ());
        map.insert("a", 2, false, ());

        assert_eq!(map.len(), 1);
        assert_eq!(map.keys().count(), 1);
        assert_eq!(map.get("a").unwrap().value, 2);
    }

    #[test]
    fn oldest_unpinned_skips_pins() {
        let mut map: EntryMap<u32> = EntryMap::default();
        map.insert("a", 1, true, ());
        map.insert("b", 2, false, ());
        assert_eq!(map.oldest_unpinned().as_deref(), Some("b"));

        map.set_pin("b", true);
        assert_eq!(map.oldest_unpinned(), None);
    }

    #[test]
    fn remove_unpinned_respects_pin() {
        let mut map: EntryMap<u32> = EntryMap::default();
        map.insert("a", 1, true, ());
        assert!(!map.remove_unpinned("a"));
        assert!(map.contains("a"));

        map.set_pin("a", false);
        assert!(map.remove_unpinned("a"));
        assert!(!map.contains("a"));
    }
}
