// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local key-value store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use wuzzy_core::{KeyValueStore, StoreError};

use crate::entry_size;

/// In-memory [`KeyValueStore`] with an optional byte quota.
///
/// A store built with [`MemoryStore::disabled`] rejects every call, the way
/// browser storage behaves when the user has turned it off.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<u64>,
    disabled: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: Option<u64>) -> Self {
        Self {
            quota_bytes,
            ..Self::default()
        }
    }

    /// A store whose every operation fails with [`StoreError::Unavailable`].
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    /// Bytes currently used by all entries.
    pub fn used_bytes(&self) -> u64 {
        self.lock()
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_enabled(&self) -> Result<(), StoreError> {
        if self.disabled {
            Err(StoreError::Unavailable("storage is disabled".into()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_enabled()?;
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_enabled()?;
        let mut entries = self.lock();
        if let Some(limit) = self.quota_bytes {
            let others: u64 = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| entry_size(k, v))
                .sum();
            let needed = others + entry_size(key, value);
            if needed > limit {
                return Err(StoreError::QuotaExceeded { needed, limit });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check_enabled()?;
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn quota_counts_replacement_not_old_value() {
        let store = MemoryStore::with_quota(Some(10));
        store.set("k", "123456789").unwrap();
        // Replacing the same key only counts the new value.
        store.set("k", "987654321").unwrap();
        let err = store.set("k", "0123456789").unwrap_err();
        assert_eq!(
            err,
            StoreError::QuotaExceeded {
                needed: 11,
                limit: 10
            }
        );
        assert_eq!(store.used_bytes(), 10);
    }

    #[test]
    fn disabled_store_is_unavailable() {
        let store = MemoryStore::disabled();
        assert!(!store.is_available());
        assert!(matches!(store.get("a"), Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn probe_leaves_no_residue() {
        let store = MemoryStore::new();
        assert!(store.is_available());
        assert!(store.is_empty());
    }
}
