// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP transport to the analytics API.

use async_trait::async_trait;

use crate::error::{AnalyticsError, SessionInitError};
use crate::outcome::BatchOutcome;
use crate::types::{SessionInitResponse, UbiQuery};

/// Identity headers sent with `GET /session/init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInitRequest {
    pub client_name: String,
    pub client_version: String,
    /// Only set when a wallet is connected and wallet consent is accepted.
    pub wallet_address: Option<String>,
}

/// The three analytics API calls the pipeline makes.
#[async_trait]
pub trait AnalyticsTransport: Send + Sync + 'static {
    /// `GET {api}/session/init`.
    async fn init_session(
        &self,
        request: &SessionInitRequest,
    ) -> Result<SessionInitResponse, SessionInitError>;

    /// `PUT {api}/session/update`, associating a wallet with a session.
    async fn update_session(
        &self,
        session_id: &str,
        wallet_address: &str,
    ) -> Result<(), AnalyticsError>;

    /// `POST {api}/analytics/batch`. Never fails: network errors are
    /// reported as [`BatchOutcome::Retryable`].
    async fn send_batch(&self, queries: &[UbiQuery]) -> BatchOutcome;
}
