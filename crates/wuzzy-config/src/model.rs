// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Wuzzy configuration.
///
/// Every section is optional and defaults to the values the search site ships with.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WuzzyConfig {
    /// Analytics API endpoint and client identity.
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Delivery queue batching and retry tuning.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Persistent store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Analytics API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyticsConfig {
    /// Base URL of the analytics API. `None` disables delivery.
    #[serde(default)]
    pub api_url: Option<String>,

    /// Sent as `X-Client-Name` and used as the first client id segment.
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Sent as `X-Client-Version`.
    #[serde(default = "default_client_version")]
    pub client_version: String,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            client_name: default_client_name(),
            client_version: default_client_version(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AnalyticsConfig {
    /// The API base URL with any trailing slash removed, if one is set.
    pub fn base_url(&self) -> Option<&str> {
        self.api_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_client_name() -> String {
    "wuzzy-site".to_string()
}

fn default_client_version() -> String {
    "1.0.0".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

/// Delivery queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Queue length that triggers an immediate flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay before a partial batch is flushed, in milliseconds.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Hard cap on queued events; the oldest are dropped first.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Failed attempts after which the queue is dropped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff base delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            max_queue_size: default_max_queue_size(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

impl QueueConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

fn default_batch_size() -> usize {
    10
}

fn default_flush_interval_ms() -> u64 {
    30_000
}

fn default_max_queue_size() -> usize {
    1000
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_retry_delay_ms() -> u64 {
    60_000
}

/// Which persistent store backs consent, session, and queue state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local; state is lost on exit.
    Memory,
    /// SQLite file; state survives restarts.
    #[default]
    Sqlite,
}

/// Persistent store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Total bytes of stored values allowed. `None` is unlimited.
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_path: default_database_path(),
            quota_bytes: default_quota_bytes(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("wuzzy").join("analytics.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("wuzzy-analytics.db"))
        .display()
        .to_string()
}

fn default_quota_bytes() -> Option<u64> {
    // Matches the per-origin budget browsers give localStorage.
    Some(5 * 1024 * 1024)
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
