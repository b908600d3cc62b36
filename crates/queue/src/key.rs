//! QueueKey - opaque queue identity
//!
//! Keys are minted once per name and stay stable for the name's lifetime,
//! so the hot path routes on a `u64` instead of a string lookup.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

/// Opaque 64-bit queue identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueKey(pub u64);

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue:{}", self.0)
    }
}

/// Bijection between queue names and keys
///
/// `get_key` mints a key on first sight of a name and returns the same key
/// afterwards. A key stays bound to its name until `remove_key`, which the
/// registries call when they reap a deleted queue.
#[derive(Debug, Default)]
pub struct QueueKeyManager {
    inner: RwLock<KeyTable>,
}

#[derive(Debug, Default)]
struct KeyTable {
    name_to_key: HashMap<String, QueueKey>,
    key_to_name: HashMap<QueueKey, String>,
    next: u64,
}

impl QueueKeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint or look up the key for a name
    pub fn get_key(&self, name: &str) -> QueueKey {
        {
            let table = self.inner.read();
            if let Some(key) = table.name_to_key.get(name) {
                return *key;
            }
        }
        let mut table = self.inner.write();
        // Racing callers both reach here; re-check under the write lock.
        if let Some(key) = table.name_to_key.get(name) {
            return *key;
        }
        let key = QueueKey(table.next);
        table.next += 1;
        table.name_to_key.insert(name.to_string(), key);
        table.key_to_name.insert(key, name.to_string());
        key
    }

    /// Name bound to a key, or empty when the key is unknown
    pub fn get_name(&self, key: QueueKey) -> String {
        self.inner
            .read()
            .key_to_name
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_key(&self, name: &str) -> bool {
        self.inner.read().name_to_key.contains_key(name)
    }

    /// Unbind a key; returns whether it was bound
    pub fn remove_key(&self, key: QueueKey) -> bool {
        let mut table = self.inner.write();
        match table.key_to_name.remove(&key) {
            Some(name) => {
                table.name_to_key.remove(&name);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut table = self.inner.write();
        table.name_to_key.clear();
        table.key_to_name.clear();
        table.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_key() {
        let manager = QueueKeyManager::new();
        let a = manager.get_key("pipeline_a");
        let b = manager.get_key("pipeline_b");
        assert_ne!(a, b);
        assert_eq!(manager.get_key("pipeline_a"), a);
        assert_eq!(manager.get_name(a), "pipeline_a");
    }

    #[test]
    fn remove_unbinds_both_directions() {
        let manager = QueueKeyManager::new();
        let key = manager.get_key("name");
        assert!(manager.remove_key(key));
        assert!(!manager.has_key("name"));
        assert_eq!(manager.get_name(key), "");
        assert!(!manager.remove_key(key));

        // A re-minted name gets a fresh key.
        assert_ne!(manager.get_key("name"), key);
    }
}
