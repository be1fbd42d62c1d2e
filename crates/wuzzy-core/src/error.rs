// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Wuzzy analytics pipeline.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across the analytics crates.
///
/// None of these ever reach the search/UI caller: the public submission API
/// logs and swallows them. They exist so the internals can propagate with `?`.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Configuration errors (invalid TOML, missing endpoint, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistent store errors (quota, unavailable storage, backend failure).
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// HTTP transport errors (connection refused, unreadable body).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Session acquisition or renewal failed.
    #[error("session error: {0}")]
    Session(#[from] SessionInitError),

    /// Tracking was attempted without accepted consent.
    #[error("analytics consent has not been accepted")]
    ConsentRequired,

    /// A wallet operation was attempted without a wallet address.
    #[error("no wallet address is connected")]
    WalletRequired,

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised by a [`KeyValueStore`](crate::traits::KeyValueStore).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Storage is disabled or cannot be opened.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Writing the value would exceed the configured quota.
    #[error("storage quota exceeded: {needed} bytes needed, limit {limit}")]
    QuotaExceeded { needed: u64, limit: u64 },

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true for quota errors, which callers recover from by trimming.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}

/// Failure classes for `GET /session/init`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionInitError {
    /// HTTP 429; `retry_after` carries the `Retry-After` header when present.
    #[error("session init rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// The server rejected the client name/version or other request data.
    #[error("session init rejected as invalid: {message}")]
    Validation { message: String },

    /// Any other non-2xx status.
    #[error("session init failed with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Network failure or unparseable body.
    #[error("session init transport failure: {0}")]
    Transport(String),

    /// No analytics endpoint is configured.
    #[error("analytics endpoint not configured")]
    NotConfigured,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_into_analytics_error() {
        let err: AnalyticsError = StoreError::QuotaExceeded {
            needed: 10,
            limit: 5,
        }
        .into();
        assert!(matches!(
            err,
            AnalyticsError::Storage(StoreError::QuotaExceeded { .. })
        ));
        assert!(err.to_string().contains("quota"));
    }

    #[test]
    fn rate_limited_display_mentions_retry_after() {
        let err = SessionInitError::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        };
        assert!(err.to_string().contains("30s"), "got: {err}");
    }
}
