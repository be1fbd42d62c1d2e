// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire and persisted types shared across the analytics crates.
//!
//! Field names follow the OpenSearch UBI (User Behavior Insights) query
//! schema accepted by the analytics API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Consent to general analytics tracking.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConsentStatus {
    /// No decision recorded yet.
    Pending,
    Accepted,
    Declined,
    /// Storage is unavailable, so no decision can be read or recorded.
    Unknown,
}

impl ConsentStatus {
    pub fn is_accepted(self) -> bool {
        self == ConsentStatus::Accepted
    }
}

/// Consent to linking a connected wallet address to the analytics session.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WalletConsentStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
}

/// Search context a query was issued from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ApplicationType {
    GraphqlImages,
    GraphqlAudio,
    GraphqlVideo,
}

/// A tracked search query, queued until delivered in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UbiQuery {
    pub application: ApplicationType,
    pub query_id: Uuid,
    /// Rewritten in bulk when the session is renewed.
    pub client_id: String,
    pub user_query: String,
    /// ISO-8601 timestamp of submission.
    pub timestamp: String,
    pub query_response_hit_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_attributes: Option<BTreeMap<String, serde_json::Value>>,
}

/// Persisted backoff state of the delivery queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryState {
    #[serde(default)]
    pub attempts: u32,
    /// Absolute deadline of the next retry, in Unix epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<i64>,
}

/// Successful `GET /session/init` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInitResponse {
    pub session_id: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Machine-readable error codes in the API error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidSession,
    ExpiredSession,
    ValidationError,
    InvalidClientName,
    RateLimitExceeded,
    InternalError,
    /// A code this client does not know about.
    #[serde(other)]
    Other,
}

/// Recovery action recommended by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorAction {
    RequestNewSession,
    FixData,
    RetryLater,
    ContactSupport,
    #[serde(other)]
    Other,
}

/// Error message field, which validation failures send as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    Lines(Vec<String>),
}

impl ErrorMessage {
    /// Flattens the message into one line.
    pub fn joined(&self) -> String {
        match self {
            ErrorMessage::Text(text) => text.clone(),
            ErrorMessage::Lines(lines) => lines.join("; "),
        }
    }
}

/// Structured error body returned by the analytics API on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub message: ErrorMessage,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ErrorAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,
}

impl ErrorEnvelope {
    /// True when the server asks for a fresh session because the current one
    /// expired or is unknown.
    pub fn requests_new_session(&self) -> bool {
        self.action == Some(ErrorAction::RequestNewSession)
            && matches!(
                self.error_code,
                Some(ErrorCode::ExpiredSession) | Some(ErrorCode::InvalidSession)
            )
    }

    /// True when resubmitting the same payload can never succeed.
    pub fn is_invalid_data(&self) -> bool {
        self.action == Some(ErrorAction::FixData)
    }

    pub fn is_retryable(&self) -> bool {
        self.action == Some(ErrorAction::RetryLater)
            || self.retry == Some(true)
            || self.error_code == Some(ErrorCode::RateLimitExceeded)
    }
}
