use std::collections::HashSet;
use std::hash::Hash;

/// Set of selected keys that remembers the order keys were selected in
#[derive(Debug, Clone)]
pub struct SelectionSet<K> {
    order: Vec<K>,
    members: HashSet<K>,
}

impl<K> Default for SelectionSet<K> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            members: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> SelectionSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `key`; returns whether it is selected afterwards
    pub fn toggle(&mut self, key: K) -> bool {
        if self.members.remove(&key) {
            self.order.retain(|k| k != &key);
            false
        } else {
            self.members.insert(key.clone());
            self.order.push(key);
            true
        }
    }

    pub fn insert(&mut self, key: K) -> bool {
        if self.members.insert(key.clone()) {
            self.order.push(key);
            true
        } else {
            false
        }
    }

    pub fn remove(&mut self, key: &K) -> bool {
        if self.members.remove(key) {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.members.contains(key)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// Replace the selection with `keys`, keeping their order
    pub fn replace<I: IntoIterator<Item = K>>(&mut self, keys: I) {
        self.clear();
        for key in keys {
            self.insert(key);
        }
    }

    /// Drop every key for which `keep` returns false
    pub fn retain<F: FnMut(&K) -> bool>(&mut self, mut keep: F) {
        let members = &mut self.members;
        self.order.retain(|k| {
            if keep(k) {
                true
            } else {
                members.remove(k);
                false
            }
        });
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Selected keys in selection order
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }
}
