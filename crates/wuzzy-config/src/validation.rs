// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::{StorageBackend, WuzzyConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first.
pub fn validate_config(config: &WuzzyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if let Some(raw) = config.analytics.api_url.as_deref() {
        match url::Url::parse(raw.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => fail(format!(
                "analytics.api_url must use http or https, got `{}`",
                url.scheme()
            )),
            Err(e) => fail(format!("analytics.api_url `{raw}` is not a valid URL: {e}")),
        }
    }

    let name = &config.analytics.client_name;
    if name.trim().is_empty() {
        fail("analytics.client_name must not be empty".to_string());
    } else if name.contains('@') {
        fail(format!(
            "analytics.client_name `{name}` must not contain `@` (it separates client id segments)"
        ));
    }
    if config.analytics.client_version.trim().is_empty() {
        fail("analytics.client_version must not be empty".to_string());
    }
    if config.analytics.request_timeout_secs == 0 {
        fail("analytics.request_timeout_secs must be at least 1".to_string());
    }

    let queue = &config.queue;
    if queue.batch_size == 0 {
        fail("queue.batch_size must be at least 1".to_string());
    }
    if queue.max_queue_size < queue.batch_size {
        fail(format!(
            "queue.max_queue_size ({}) must be at least queue.batch_size ({})",
            queue.max_queue_size, queue.batch_size
        ));
    }
    if queue.max_retries == 0 {
        fail("queue.max_retries must be at least 1".to_string());
    }
    if queue.base_delay_ms == 0 {
        fail("queue.base_delay_ms must be at least 1".to_string());
    }
    if queue.max_retry_delay_ms < queue.base_delay_ms {
        fail(format!(
            "queue.max_retry_delay_ms ({}) must not be below queue.base_delay_ms ({})",
            queue.max_retry_delay_ms, queue.base_delay_ms
        ));
    }

    if config.storage.backend == StorageBackend::Sqlite
        && config.storage.database_path.trim().is_empty()
    {
        fail("storage.database_path must not be empty for the sqlite backend".to_string());
    }
    if config.storage.quota_bytes == Some(0) {
        fail("storage.quota_bytes must be positive when set".to_string());
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
        fail(format!(
            "logging.level `{}` must be one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&WuzzyConfig::default()).is_ok());
    }

    #[test]
    fn non_http_api_url_fails() {
        let mut config = WuzzyConfig::default();
        config.analytics.api_url = Some("ftp://analytics.example".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "http or https"));
    }

    #[test]
    fn client_name_with_separator_fails() {
        let mut config = WuzzyConfig::default();
        config.analytics.client_name = "wuzzy@site".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "client_name"));
    }

    #[test]
    fn inverted_backoff_bounds_fail() {
        let mut config = WuzzyConfig::default();
        config.queue.base_delay_ms = 5000;
        config.queue.max_retry_delay_ms = 1000;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "max_retry_delay_ms"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = WuzzyConfig::default();
        config.queue.batch_size = 0;
        config.queue.max_retries = 0;
        config.logging.level = "loud".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
