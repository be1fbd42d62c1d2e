// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent key-value storage that survives process restarts.

use crate::error::StoreError;

const PROBE_KEY: &str = "__wuzzy_probe__";

/// String key-value storage.
///
/// Calls are synchronous: the queue persists on every mutation and must not
/// yield between mutating and persisting.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Probes the store with a throwaway write.
    fn is_available(&self) -> bool {
        self.set(PROBE_KEY, PROBE_KEY).is_ok() && self.remove(PROBE_KEY).is_ok()
    }
}
