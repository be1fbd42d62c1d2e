// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded exponential backoff.

use std::time::Duration;

use wuzzy_config::model::QueueConfig;

/// Longest server `Retry-After` hint honoured; larger hints are clamped.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60 * 60);

/// Retry delays of `base × 2^attempts`, capped, for at most `max_retries`
/// failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl BackoffPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            base_delay: config.base_delay(),
            max_delay: config.max_retry_delay(),
            max_retries: config.max_retries,
        }
    }

    /// Delay before the next attempt once `attempts` failures have happened.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let factor = 2u32.checked_pow(attempts).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
            .min(self.max_delay)
    }

    /// Delay for the next attempt, preferring a server hint when present.
    ///
    /// Hints may exceed `max_delay` but never [`MAX_RETRY_AFTER`] (or
    /// `max_delay`, if that is configured higher).
    pub fn delay_with_hint(&self, attempts: u32, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hint) => hint.min(MAX_RETRY_AFTER.max(self.max_delay)),
            None => self.delay_for(attempts),
        }
    }

    /// Whether `attempts` failures means the queue should be given up on.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_retries
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn default_schedule_doubles_then_caps() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u64> = (1..=7).map(|n| policy.delay_for(n).as_secs()).collect();
        assert_eq!(delays, [2, 4, 8, 16, 32, 60, 60]);
    }

    #[test]
    fn server_hint_is_used_but_clamped() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            policy.delay_with_hint(1, Some(Duration::from_secs(90))),
            Duration::from_secs(90)
        );
        assert_eq!(policy.delay_with_hint(1, None), Duration::from_secs(2));
        assert_eq!(
            policy.delay_with_hint(1, Some(Duration::from_secs(u64::MAX))),
            MAX_RETRY_AFTER
        );
    }

    #[test]
    fn exhausted_at_max_retries() {
        let policy = BackoffPolicy::default();
        assert!(!policy.is_exhausted(4));
        assert!(policy.is_exhausted(5));
        assert!(policy.is_exhausted(6));
    }

    proptest! {
        #[test]
        fn delay_never_exceeds_cap(
            base_ms in 1u64..10_000,
            cap_ms in 1u64..600_000,
            attempts in 0u32..64,
        ) {
            let policy = BackoffPolicy {
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_millis(cap_ms),
                max_retries: 5,
            };
            prop_assert!(policy.delay_for(attempts) <= Duration::from_millis(cap_ms));
        }

        #[test]
        fn delay_is_monotonic(attempts in 0u32..63) {
            let policy = BackoffPolicy::default();
            prop_assert!(policy.delay_for(attempts) <= policy.delay_for(attempts + 1));
        }
    }
}
