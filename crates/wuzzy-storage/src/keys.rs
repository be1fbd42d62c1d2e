// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage keys. Values are JSON-encoded.

/// `"accepted" | "declined"`.
pub const CONSENT: &str = "wuzzy_analytics_consent";

/// The current analytics session id.
pub const SESSION_ID: &str = "wuzzy_analytics_session_id";

/// `"pending" | "accepted" | "declined"`.
pub const WALLET_CONSENT: &str = "wuzzy_wallet_consent";

/// Ordered array of queued `UbiQuery` records.
pub const QUEUE: &str = "wuzzy_analytics_queue";

/// `{ attempts, nextRetryAt? }`.
pub const RETRY_STATE: &str = "wuzzy_analytics_retry";
