// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of `POST /analytics/batch` responses.
//!
//! The HTTP layer decodes every response exactly once into a [`BatchOutcome`];
//! the delivery queue only ever matches on the variant.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::ErrorEnvelope;

/// Result of one batch delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Any 2xx response.
    Success,
    /// The session behind the batch's client ids expired; renew and resend.
    SessionExpired { message: String },
    /// The payload was rejected; resending it can never succeed.
    ValidationError { message: String },
    /// Temporary failure: rate limiting, `RETRY_LATER`, or a network error.
    Retryable {
        reason: String,
        retry_after: Option<Duration>,
    },
    /// Non-2xx response that could not be classified.
    Unknown { status: Option<u16>, reason: String },
}

impl BatchOutcome {
    /// Classifies an HTTP response by status, `Retry-After` hint, and body.
    pub fn from_response(status: u16, retry_after: Option<Duration>, body: &str) -> Self {
        if (200..300).contains(&status) {
            return BatchOutcome::Success;
        }

        let envelope = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => envelope,
            Err(_) if status == 429 => {
                return BatchOutcome::Retryable {
                    reason: "rate limited".to_string(),
                    retry_after,
                };
            }
            Err(e) => {
                return BatchOutcome::Unknown {
                    status: Some(status),
                    reason: format!("unparseable error body: {e}"),
                };
            }
        };

        let message = envelope.message.joined();
        if envelope.requests_new_session() {
            BatchOutcome::SessionExpired { message }
        } else if envelope.is_invalid_data() {
            BatchOutcome::ValidationError { message }
        } else if envelope.is_retryable() || status == 429 {
            BatchOutcome::Retryable {
                reason: message,
                retry_after,
            }
        } else {
            BatchOutcome::Unknown {
                status: Some(status),
                reason: message,
            }
        }
    }

    /// A request that never produced a response.
    pub fn transport_failure(reason: impl std::fmt::Display) -> Self {
        BatchOutcome::Retryable {
            reason: reason.to_string(),
            retry_after: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Success)
    }

    /// Server-provided delay hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BatchOutcome::Retryable { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Parses a `Retry-After` header value: delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    (at - now).to_std().ok().or(Some(Duration::ZERO))
}
