// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The analytics service object.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::SecondsFormat;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;
use wuzzy_config::WuzzyConfig;
use wuzzy_core::{
    AnalyticsError, ApplicationType, Clock, ConsentStatus, RetryState, UbiQuery,
    WalletConsentStatus,
};
use wuzzy_queue::{spawn_timer_driver, DeliveryQueue, FiredTimers, QueuePhase};
use wuzzy_session::SessionManager;

use crate::builder::AnalyticsBuilder;

/// Consent-aware search analytics: the entry point for a host application.
///
/// Cloning is cheap; clones share the same session and queue.
#[derive(Clone)]
pub struct Analytics {
    session: Arc<SessionManager>,
    queue: Arc<DeliveryQueue>,
    clock: Arc<dyn Clock>,
    /// Fired-timer receiver of the built-in scheduler, taken by the driver.
    fired: Arc<Mutex<Option<FiredTimers>>>,
}

impl Analytics {
    pub fn builder(config: WuzzyConfig) -> AnalyticsBuilder {
        AnalyticsBuilder::new(config)
    }

    pub(crate) fn from_parts(
        session: Arc<SessionManager>,
        queue: Arc<DeliveryQueue>,
        clock: Arc<dyn Clock>,
        fired: Option<FiredTimers>,
    ) -> Self {
        Self {
            session,
            queue,
            clock,
            fired: Arc::new(Mutex::new(fired)),
        }
    }

    /// Starts feeding queue timers from the built-in scheduler.
    ///
    /// Returns `None` when a custom scheduler was supplied or the driver is
    /// already running.
    pub fn spawn_timer_driver(&self, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        let fired = self
            .fired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        Some(spawn_timer_driver(self.queue.clone(), fired, shutdown))
    }

    /// Loads consent, session and the persisted queue. Idempotent.
    pub async fn initialize(&self) {
        self.session.initialize().await;
        self.queue.initialize();
    }

    // --- tracking ---

    /// Records a search query and returns its correlation id at once.
    ///
    /// Tracking (session acquisition, enqueueing, a batch send when one
    /// fills) runs on a spawned task, so the caller never waits on the
    /// analytics API. Without accepted consent nothing is recorded. Failures
    /// are logged and never surface here. Outside a tokio runtime the query
    /// is not tracked.
    pub fn submit_query(
        &self,
        application: ApplicationType,
        user_query: &str,
        hit_ids: Vec<String>,
        attributes: Option<BTreeMap<String, serde_json::Value>>,
    ) -> Uuid {
        let query_id = Uuid::new_v4();
        let Ok(runtime) = Handle::try_current() else {
            warn!(%query_id, "no async runtime, search query not tracked");
            return query_id;
        };
        let analytics = self.clone();
        let user_query = user_query.to_string();
        runtime.spawn(async move {
            analytics
                .record(query_id, application, &user_query, hit_ids, attributes)
                .await;
        });
        query_id
    }

    /// Like [`Analytics::submit_query`], but waits until the query is queued,
    /// including any batch send it triggers.
    ///
    /// For short-lived hosts that must not exit before the event is stored.
    pub async fn track_query(
        &self,
        application: ApplicationType,
        user_query: &str,
        hit_ids: Vec<String>,
        attributes: Option<BTreeMap<String, serde_json::Value>>,
    ) -> Uuid {
        let query_id = Uuid::new_v4();
        self.record(query_id, application, user_query, hit_ids, attributes)
            .await;
        query_id
    }

    async fn record(
        &self,
        query_id: Uuid,
        application: ApplicationType,
        user_query: &str,
        hit_ids: Vec<String>,
        attributes: Option<BTreeMap<String, serde_json::Value>>,
    ) {
        match self
            .track(query_id, application, user_query, hit_ids, attributes)
            .await
        {
            Ok(()) => {}
            Err(AnalyticsError::ConsentRequired) => {
                debug!(%query_id, "analytics consent not accepted, query not tracked");
            }
            Err(e) => warn!(%query_id, error = %e, "failed to track search query"),
        }
    }

    async fn track(
        &self,
        query_id: Uuid,
        application: ApplicationType,
        user_query: &str,
        hit_ids: Vec<String>,
        attributes: Option<BTreeMap<String, serde_json::Value>>,
    ) -> Result<(), AnalyticsError> {
        if !self.session.is_initialized() || !self.queue.is_initialized() {
            self.initialize().await;
        }
        if !self.session.has_consent() {
            return Err(AnalyticsError::ConsentRequired);
        }

        let client_id = self.session.ensure_client_id().await?;
        let event = UbiQuery {
            application,
            query_id,
            client_id,
            user_query: user_query.to_string(),
            timestamp: self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true),
            query_response_hit_ids: hit_ids,
            query_attributes: attributes,
        };
        debug!(%query_id, %application, "tracking search query");
        self.queue.add(event).await;
        Ok(())
    }

    /// Sends whatever is queued now.
    pub async fn flush(&self) {
        self.queue.flush().await;
    }

    /// Fire-and-forget flush for shutdown paths.
    pub fn flush_on_teardown(&self) -> JoinHandle<()> {
        self.queue.flush_on_teardown()
    }

    /// Sends events waiting on the flush timer before the host exits, giving
    /// up after `limit`.
    ///
    /// A queue in backoff is left alone; its retry deadline is persisted and
    /// resumes on the next start.
    pub async fn flush_before_exit(&self, limit: Duration) {
        if self.queue.phase() != QueuePhase::Scheduled {
            return;
        }
        let pending = self.queue.len();
        match tokio::time::timeout(limit, self.flush_on_teardown()).await {
            Ok(Ok(())) => debug!(pending, "flushed analytics queue before exit"),
            Ok(Err(e)) => warn!(error = %e, "analytics flush task failed at exit"),
            Err(_) => warn!(
                pending,
                limit_ms = limit.as_millis() as u64,
                "analytics flush at exit timed out"
            ),
        }
    }

    /// Deletes every trace of the user: queued events, retry state, session,
    /// consent and wallet consent.
    pub fn clear_all_data(&self) {
        self.queue.clear();
        self.session.clear_session();
        self.session.clear_wallet_consent();
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_phase(&self) -> QueuePhase {
        self.queue.phase()
    }

    pub fn retry_state(&self) -> RetryState {
        self.queue.retry_state()
    }

    pub fn queued_events(&self) -> Vec<UbiQuery> {
        self.queue.snapshot()
    }

    // --- consent ---

    pub fn consent_status(&self) -> ConsentStatus {
        self.session.consent_status()
    }

    pub fn has_consent(&self) -> bool {
        self.session.has_consent()
    }

    pub fn needs_consent(&self) -> bool {
        self.session.needs_consent()
    }

    pub async fn accept_consent(&self) {
        self.session.accept_consent().await;
    }

    pub fn decline_consent(&self) {
        self.session.decline_consent();
    }

    pub fn client_id(&self) -> Option<String> {
        self.session.client_id()
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.session_id()
    }

    // --- wallet ---

    pub fn connect_wallet(&self, wallet_address: &str) {
        self.session.connect_wallet(wallet_address);
    }

    pub fn disconnect_wallet(&self) {
        self.session.disconnect_wallet();
    }

    pub fn wallet_address(&self) -> Option<String> {
        self.session.wallet_address()
    }

    pub fn wallet_consent_status(&self) -> WalletConsentStatus {
        self.session.wallet_consent_status()
    }

    pub async fn accept_wallet_consent(&self, wallet_address: &str) -> Result<(), AnalyticsError> {
        self.session.accept_wallet_consent(wallet_address).await
    }

    pub fn decline_wallet_consent(&self) {
        self.session.decline_wallet_consent();
    }

    pub fn needs_wallet_consent(&self, wallet_address: Option<&str>) -> bool {
        self.session.needs_wallet_consent(wallet_address)
    }

    pub fn has_wallet_consent(&self, wallet_address: Option<&str>) -> bool {
        self.session.has_wallet_consent(wallet_address)
    }
}
