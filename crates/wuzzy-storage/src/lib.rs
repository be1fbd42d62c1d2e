// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent storage for consent, session, and queue state.
//!
//! Provides two [`KeyValueStore`] backends (process-local memory and a SQLite
//! file that survives restarts) and [`StateStore`], the typed adapter the
//! session manager and delivery queue read and write through.

pub mod keys;
pub mod memory;
pub mod sqlite;
pub mod state;

use std::sync::Arc;

use wuzzy_config::model::{StorageBackend, StorageConfig};
use wuzzy_core::{KeyValueStore, StoreError};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use state::StateStore;

/// Open the store selected by configuration.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::with_quota(config.quota_bytes))),
        StorageBackend::Sqlite => Ok(Arc::new(SqliteStore::open(
            &config.database_path,
            config.quota_bytes,
        )?)),
    }
}

/// Bytes a key-value pair counts against a quota.
pub(crate) fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}
