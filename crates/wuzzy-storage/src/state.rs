// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed access to persisted pipeline state.
//!
//! [`StateStore`] owns the key layout and JSON encoding. Read failures are
//! logged and degrade to "nothing stored"; write failures are returned so the
//! caller can decide whether they matter.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use wuzzy_core::{
    ConsentStatus, KeyValueStore, RetryState, StoreError, UbiQuery, WalletConsentStatus,
};

use crate::keys;

/// Share of the queue dropped when a write hits the storage quota.
const QUOTA_TRIM_FRACTION: f64 = 0.1;

/// Typed wrapper over a [`KeyValueStore`].
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<dyn KeyValueStore>,
}

impl StateStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    pub fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    /// Raw string value, tolerating values written without JSON quoting.
    fn get_string(&self, key: &str) -> Option<String> {
        let raw = match self.inner.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                debug!(key, error = %e, "failed to read from store");
                return None;
            }
        };
        Some(serde_json::from_str::<String>(&raw).unwrap_or(raw))
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.inner.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                debug!(key, error = %e, "failed to read from store");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable stored value");
                None
            }
        }
    }

    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let encoded =
            serde_json::to_string(value).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.inner.set(key, &encoded)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }

    // --- consent ---

    /// Stored general consent: `Unknown` when storage is unavailable,
    /// `Pending` when nothing (or something unrecognized) is stored.
    pub fn load_consent(&self) -> ConsentStatus {
        if !self.is_available() {
            return ConsentStatus::Unknown;
        }
        match self
            .get_string(keys::CONSENT)
            .and_then(|s| ConsentStatus::from_str(&s).ok())
        {
            Some(status @ (ConsentStatus::Accepted | ConsentStatus::Declined)) => status,
            _ => ConsentStatus::Pending,
        }
    }

    pub fn save_consent(&self, status: ConsentStatus) -> Result<(), StoreError> {
        self.set_json(keys::CONSENT, &status)
    }

    pub fn clear_consent(&self) -> Result<(), StoreError> {
        self.remove(keys::CONSENT)
    }

    pub fn load_wallet_consent(&self) -> WalletConsentStatus {
        self.get_string(keys::WALLET_CONSENT)
            .and_then(|s| WalletConsentStatus::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save_wallet_consent(&self, status: WalletConsentStatus) -> Result<(), StoreError> {
        self.set_json(keys::WALLET_CONSENT, &status)
    }

    pub fn clear_wallet_consent(&self) -> Result<(), StoreError> {
        self.remove(keys::WALLET_CONSENT)
    }

    // --- session ---

    pub fn load_session_id(&self) -> Option<String> {
        self.get_string(keys::SESSION_ID).filter(|id| !id.is_empty())
    }

    pub fn save_session_id(&self, session_id: &str) -> Result<(), StoreError> {
        self.set_json(keys::SESSION_ID, session_id)
    }

    pub fn clear_session_id(&self) -> Result<(), StoreError> {
        self.remove(keys::SESSION_ID)
    }

    // --- queue ---

    /// Persisted queue, keeping only the newest `max_len` entries.
    pub fn load_queue(&self, max_len: usize) -> VecDeque<UbiQuery> {
        let mut queue: VecDeque<UbiQuery> = self.get_json(keys::QUEUE).unwrap_or_default();
        let excess = queue.len().saturating_sub(max_len);
        queue.drain(..excess);
        queue
    }

    /// Persist the queue, trimming the oldest entries once on quota errors.
    ///
    /// On `QuotaExceeded`, drops 10% of the queue (at least one entry) from
    /// the front of `queue` itself and retries the write a single time.
    /// Returns how many entries were dropped.
    pub fn save_queue(&self, queue: &mut VecDeque<UbiQuery>) -> Result<usize, StoreError> {
        match self.set_json(keys::QUEUE, &*queue) {
            Ok(()) => Ok(0),
            Err(e) if e.is_quota_exceeded() => {
                let drop_count = quota_trim_count(queue.len());
                debug!(
                    dropped = drop_count,
                    "storage quota exceeded, dropping oldest analytics items"
                );
                queue.drain(..drop_count);
                self.set_json(keys::QUEUE, &*queue)?;
                Ok(drop_count)
            }
            Err(e) => Err(e),
        }
    }

    pub fn clear_queue(&self) -> Result<(), StoreError> {
        self.remove(keys::QUEUE)
    }

    // --- retry state ---

    pub fn load_retry_state(&self) -> Option<RetryState> {
        self.get_json(keys::RETRY_STATE)
    }

    pub fn save_retry_state(&self, state: &RetryState) -> Result<(), StoreError> {
        self.set_json(keys::RETRY_STATE, state)
    }

    pub fn clear_retry_state(&self) -> Result<(), StoreError> {
        self.remove(keys::RETRY_STATE)
    }
}

/// Entries to drop from a queue of `len` after a quota failure.
fn quota_trim_count(len: usize) -> usize {
    (((len as f64) * QUOTA_TRIM_FRACTION).floor() as usize)
        .max(1)
        .min(len)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;
    use wuzzy_core::ApplicationType;

    use super::*;
    use crate::MemoryStore;

    fn query(text: &str) -> UbiQuery {
        UbiQuery {
            application: ApplicationType::GraphqlImages,
            query_id: Uuid::new_v4(),
            client_id: "wuzzy-site@1.0.0@s1".into(),
            user_query: text.into(),
            timestamp: "2026-01-01T00:00:00.000Z".into(),
            query_response_hit_ids: vec![],
            query_attributes: None,
        }
    }

    fn state(store: MemoryStore) -> (StateStore, Arc<MemoryStore>) {
        let store = Arc::new(store);
        (StateStore::new(store.clone()), store)
    }

    #[test]
    fn consent_defaults_to_pending_and_unknown_without_storage() {
        let (s, _) = state(MemoryStore::new());
        assert_eq!(s.load_consent(), ConsentStatus::Pending);

        let (disabled, _) = state(MemoryStore::disabled());
        assert_eq!(disabled.load_consent(), ConsentStatus::Unknown);
    }

    #[test]
    fn consent_is_json_encoded_but_raw_values_are_read() {
        let (s, raw) = state(MemoryStore::new());
        s.save_consent(ConsentStatus::Accepted).unwrap();
        assert_eq!(
            raw.get(keys::CONSENT).unwrap().as_deref(),
            Some("\"accepted\"")
        );

        raw.set(keys::CONSENT, "declined").unwrap();
        assert_eq!(s.load_consent(), ConsentStatus::Declined);
    }

    #[test]
    fn load_queue_keeps_newest() {
        let (s, _) = state(MemoryStore::new());
        let mut queue: VecDeque<_> = (0..5).map(|i| query(&i.to_string())).collect();
        s.save_queue(&mut queue).unwrap();

        let loaded = s.load_queue(3);
        let texts: Vec<_> = loaded.iter().map(|q| q.user_query.as_str()).collect();
        assert_eq!(texts, ["2", "3", "4"]);
    }

    #[test]
    fn corrupt_queue_loads_empty() {
        let (s, raw) = state(MemoryStore::new());
        raw.set(keys::QUEUE, "{not json").unwrap();
        assert!(s.load_queue(10).is_empty());
    }

    #[test]
    fn quota_failure_trims_oldest_tenth_and_retries_once() {
        let mut queue: VecDeque<_> = (0..20).map(|i| query(&format!("q{i:02}"))).collect();
        let full = serde_json::to_string(&queue).unwrap().len() as u64;
        // Room for the trimmed queue but not the full one.
        let quota = full - 10 + keys::QUEUE.len() as u64;
        let (s, _) = state(MemoryStore::with_quota(Some(quota)));

        let dropped = s.save_queue(&mut queue).unwrap();
        assert_eq!(dropped, 2);
        assert_eq!(queue.len(), 18);
        assert_eq!(queue.front().unwrap().user_query, "q02");
        assert_eq!(s.load_queue(100).len(), 18);
    }

    #[test]
    fn quota_failure_after_trim_is_returned() {
        let mut queue: VecDeque<_> = (0..3).map(|i| query(&i.to_string())).collect();
        let (s, _) = state(MemoryStore::with_quota(Some(16)));
        let err = s.save_queue(&mut queue).unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(queue.len(), 2, "one entry is dropped before the retry");
    }

    #[test]
    fn trim_count_has_floor_of_one() {
        assert_eq!(quota_trim_count(1), 1);
        assert_eq!(quota_trim_count(9), 1);
        assert_eq!(quota_trim_count(25), 2);
        assert_eq!(quota_trim_count(0), 0);
    }

    #[test]
    fn retry_state_round_trips_and_clears() {
        let (s, _) = state(MemoryStore::new());
        let retry = RetryState {
            attempts: 2,
            next_retry_at: Some(1_000),
        };
        s.save_retry_state(&retry).unwrap();
        assert_eq!(s.load_retry_state(), Some(retry));
        s.clear_retry_state().unwrap();
        assert_eq!(s.load_retry_state(), None);
    }
}
