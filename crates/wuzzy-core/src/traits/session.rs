// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session renewal hook used by the delivery queue.

use async_trait::async_trait;

use crate::error::AnalyticsError;

/// Replaces an expired analytics session.
#[async_trait]
pub trait SessionRenewal: Send + Sync + 'static {
    /// Requests a fresh session and returns the new client identity.
    ///
    /// `previous_client_id` is the identity carried by the rejected batch; a
    /// wallet address embedded in it is re-associated with the new session.
    async fn renew_session(
        &self,
        previous_client_id: Option<&str>,
    ) -> Result<String, AnalyticsError>;
}
