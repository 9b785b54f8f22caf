use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::lock::RecoverLock;
use crate::cache::{SessionStorage, StorageError};

const SOURCE: &str = "infra::storage::memory";

/// In-process session storage.
///
/// Keys keep their insertion order, like the browser's `sessionStorage`. An
/// optional byte quota counts key and value lengths. Write failures can be
/// forced and calls are counted, which makes the type double as a test fake.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<Vec<(String, String)>>,
    max_bytes: Option<usize>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
    removals: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(max_bytes: usize) -> Self {
        Self {
            max_bytes: Some(max_bytes),
            ..Self::default()
        }
    }

    /// Make every subsequent `set_item` fail with a backend error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `set_item` calls, successful or not.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of `remove_item` calls, including ones for absent keys.
    pub fn removals(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.items.read_or_recover(SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn used_bytes(&self) -> usize {
        self.items
            .read_or_recover(SOURCE, "used_bytes")
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum()
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .read_or_recover(SOURCE, "get_item")
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::backend("writes disabled"));
        }

        let mut items = self.items.write_or_recover(SOURCE, "set_item");
        let position = items.iter().position(|(existing, _)| existing == key);

        if let Some(limit) = self.max_bytes {
            let used: usize = items
                .iter()
                .enumerate()
                .filter(|(index, _)| Some(*index) != position)
                .map(|(_, (k, v))| k.len() + v.len())
                .sum();
            let needed = used + key.len() + value.len();
            if needed > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }

        match position {
            Some(index) => items[index].1 = value.to_string(),
            None => items.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        self.removals.fetch_add(1, Ordering::SeqCst);
        self.items
            .write_or_recover(SOURCE, "remove_item")
            .retain(|(existing, _)| existing != key);
    }

    fn keys(&self) -> Vec<String> {
        self.items
            .read_or_recover(SOURCE, "keys")
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn keys_keep_insertion_order() {
        let storage = MemoryStorage::new();
        storage.set_item("b", "1").expect("write b");
        storage.set_item("a", "2").expect("write a");
        storage.set_item("b", "3").expect("overwrite b");

        assert_eq!(storage.keys(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(storage.get_item("b").as_deref(), Some("3"));
    }

    #[test]
    fn quota_counts_keys_and_values() {
        let storage = MemoryStorage::with_quota(10);
        storage.set_item("ab", "cdef").expect("six bytes fit");

        let err = storage
            .set_item("gh", "ijklm")
            .expect_err("thirteen bytes exceed the quota");
        assert!(err.is_quota());

        // Replacing an existing value only counts the replacement.
        storage.set_item("ab", "cdefghij").expect("ten bytes fit");
        assert_eq!(storage.used_bytes(), 10);
    }

    #[test]
    fn forced_failures_are_counted() {
        let storage = MemoryStorage::new();
        storage.fail_writes(true);
        assert!(storage.set_item("k", "v").is_err());
        assert_eq!(storage.writes(), 1);
        assert!(storage.is_empty());
    }

    #[test]
    fn removals_are_counted_even_when_absent() {
        let storage = MemoryStorage::new();
        storage.remove_item("missing");
        assert_eq!(storage.removals(), 1);
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let storage = MemoryStorage::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = storage
                .items
                .write()
                .expect("items lock should be acquired");
            panic!("poison items lock");
        }));

        storage.set_item("k", "v").expect("write after poison");
        assert_eq!(storage.get_item("k").as_deref(), Some("v"));
    }
}
