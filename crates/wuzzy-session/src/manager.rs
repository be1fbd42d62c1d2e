// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consent-gated analytics session lifecycle.
//!
//! Consent and wallet consent are loaded once by [`SessionManager::initialize`]
//! and afterwards only change through the explicit accept/decline methods. A
//! session id is acquired lazily, either from the store or from
//! `GET /session/init`, and never while consent is anything but accepted.
//!
//! Failures are soft: a failed session request leaves the manager without a
//! session, so [`SessionManager::client_id`] returns `None` and the next
//! [`SessionManager::ensure_client_id`] call tries again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use wuzzy_core::{
    AnalyticsError, AnalyticsTransport, Clock, ConsentStatus, SessionInitError,
    SessionInitRequest, SessionRenewal, WalletConsentStatus,
};
use wuzzy_storage::StateStore;

use crate::identity::{fallback_session_id, wallet_from_client_id, ClientIdentity};

#[derive(Debug)]
struct SessionState {
    initialized: bool,
    consent: ConsentStatus,
    wallet_consent: WalletConsentStatus,
    /// Set once consent is answered in this process; `initialize` then
    /// keeps the in-memory answer instead of reloading it.
    consent_decided: bool,
    wallet_consent_decided: bool,
    session_id: Option<String>,
    wallet_address: Option<String>,
}

impl SessionState {
    /// The wallet to attach to the identity, if tracking it is allowed.
    fn consented_wallet(&self) -> Option<&str> {
        if self.consent.is_accepted() && self.wallet_consent == WalletConsentStatus::Accepted {
            self.wallet_address.as_deref().filter(|w| !w.is_empty())
        } else {
            None
        }
    }
}

/// Owns consent, the analytics session, and the wallet association.
pub struct SessionManager {
    store: StateStore,
    transport: Option<Arc<dyn AnalyticsTransport>>,
    identity: ClientIdentity,
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
    /// Serializes session creation so concurrent callers share one request.
    establish: tokio::sync::Mutex<()>,
}

impl SessionManager {
    /// `transport` is `None` when no analytics endpoint is configured; sessions
    /// are then local fallback ids.
    pub fn new(
        store: StateStore,
        transport: Option<Arc<dyn AnalyticsTransport>>,
        identity: ClientIdentity,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            transport,
            identity,
            clock,
            state: Mutex::new(SessionState {
                initialized: false,
                consent: ConsentStatus::Pending,
                wallet_consent: WalletConsentStatus::Pending,
                consent_decided: false,
                wallet_consent_decided: false,
                session_id: None,
                wallet_address: None,
            }),
            establish: tokio::sync::Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads persisted consent and, if accepted, establishes a session.
    ///
    /// Only the first call does anything. Never fails: session errors are
    /// logged and leave the manager without a session.
    pub async fn initialize(&self) {
        let consent = {
            let mut state = self.lock();
            if state.initialized {
                return;
            }
            state.initialized = true;
            if !state.consent_decided {
                state.consent = self.store.load_consent();
            }
            if !state.wallet_consent_decided {
                state.wallet_consent = self.store.load_wallet_consent();
            }
            state.consent
        };
        debug!(%consent, "analytics consent loaded");

        if consent.is_accepted()
            && let Err(e) = self.ensure_session().await
        {
            warn!(error = %e, "analytics session unavailable, continuing without one");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    pub fn consent_status(&self) -> ConsentStatus {
        self.lock().consent
    }

    pub fn has_consent(&self) -> bool {
        self.consent_status().is_accepted()
    }

    /// True while the user has not yet answered the consent prompt.
    pub fn needs_consent(&self) -> bool {
        self.consent_status() == ConsentStatus::Pending
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock().session_id.clone()
    }

    /// Records acceptance and establishes a session if there is none.
    pub async fn accept_consent(&self) {
        {
            let mut state = self.lock();
            state.consent = ConsentStatus::Accepted;
            state.consent_decided = true;
        }
        if let Err(e) = self.store.save_consent(ConsentStatus::Accepted) {
            warn!(error = %e, "failed to persist analytics consent");
        }
        info!("analytics consent accepted");

        if let Err(e) = self.ensure_session().await {
            warn!(error = %e, "analytics session unavailable after consent");
        }
    }

    /// Records refusal, declines wallet tracking, and drops the session.
    pub fn decline_consent(&self) {
        {
            let mut state = self.lock();
            state.consent = ConsentStatus::Declined;
            state.wallet_consent = WalletConsentStatus::Declined;
            state.consent_decided = true;
            state.wallet_consent_decided = true;
            state.session_id = None;
        }
        if let Err(e) = self.store.save_consent(ConsentStatus::Declined) {
            warn!(error = %e, "failed to persist analytics consent");
        }
        if let Err(e) = self.store.save_wallet_consent(WalletConsentStatus::Declined) {
            warn!(error = %e, "failed to persist wallet consent");
        }
        if let Err(e) = self.store.clear_session_id() {
            warn!(error = %e, "failed to clear stored session id");
        }
        info!("analytics consent declined");
    }

    /// Forgets the session and the consent answer; consent returns to pending.
    pub fn clear_session(&self) {
        {
            let mut state = self.lock();
            state.session_id = None;
            state.consent = ConsentStatus::Pending;
            state.consent_decided = true;
        }
        if let Err(e) = self
            .store
            .clear_session_id()
            .and_then(|()| self.store.clear_consent())
        {
            warn!(error = %e, "failed to clear stored session");
        }
    }

    /// The client identity, or `None` without consent or a session.
    pub fn client_id(&self) -> Option<String> {
        let state = self.lock();
        if !state.consent.is_accepted() {
            return None;
        }
        let session_id = state.session_id.as_deref()?;
        Some(self.identity.client_id(session_id, state.consented_wallet()))
    }

    /// The client identity, acquiring a session first if needed.
    pub async fn ensure_client_id(&self) -> Result<String, AnalyticsError> {
        self.ensure_session().await?;
        self.client_id().ok_or(AnalyticsError::ConsentRequired)
    }

    async fn ensure_session(&self) -> Result<String, AnalyticsError> {
        if !self.has_consent() {
            return Err(AnalyticsError::ConsentRequired);
        }
        let _guard = self.establish.lock().await;
        if let Some(session_id) = self.session_id() {
            return Ok(session_id);
        }

        let session_id = match self.store.load_session_id() {
            Some(stored) => {
                debug!(session_id = %stored, "reusing stored analytics session");
                stored
            }
            None => self.request_session().await?,
        };
        self.adopt_session(session_id)
    }

    /// Installs `session_id` unless consent was withdrawn while it was fetched.
    fn adopt_session(&self, session_id: String) -> Result<String, AnalyticsError> {
        let mut state = self.lock();
        if !state.consent.is_accepted() {
            return Err(AnalyticsError::ConsentRequired);
        }
        state.session_id = Some(session_id.clone());
        Ok(session_id)
    }

    async fn request_session(&self) -> Result<String, AnalyticsError> {
        let Some(transport) = &self.transport else {
            let session_id = fallback_session_id(self.clock.now_millis());
            warn!(session_id = %session_id, "analytics API not configured, using fallback session");
            self.persist_session_id(&session_id);
            return Ok(session_id);
        };

        let request = SessionInitRequest {
            client_name: self.identity.name.clone(),
            client_version: self.identity.version.clone(),
            wallet_address: self.lock().consented_wallet().map(str::to_owned),
        };
        match transport.init_session(&request).await {
            Ok(response) => {
                info!(session_id = %response.session_id, "analytics session initialized");
                self.persist_session_id(&response.session_id);
                Ok(response.session_id)
            }
            Err(e) => {
                match &e {
                    SessionInitError::RateLimited { retry_after } => warn!(
                        retry_after_secs = retry_after.map(|d| d.as_secs()),
                        "analytics session init rate limited"
                    ),
                    other => warn!(error = %other, "analytics session init failed"),
                }
                Err(e.into())
            }
        }
    }

    fn persist_session_id(&self, session_id: &str) {
        if let Err(e) = self.store.save_session_id(session_id) {
            warn!(error = %e, "failed to persist analytics session id");
        }
    }

    /// Associates `wallet_address` with the current session. Best effort.
    pub async fn update_session_with_wallet(&self, wallet_address: &str) {
        let Some(transport) = &self.transport else {
            debug!("analytics API not configured, skipping wallet association");
            return;
        };
        let Some(session_id) = self.session_id() else {
            debug!("no analytics session, skipping wallet association");
            return;
        };
        match transport.update_session(&session_id, wallet_address).await {
            Ok(()) => info!(session_id = %session_id, "wallet associated with analytics session"),
            Err(e) => warn!(error = %e, "failed to associate wallet with analytics session"),
        }
    }

    // --- wallet ---

    /// Records the connected wallet. It only reaches the identity once wallet
    /// consent is accepted.
    pub fn connect_wallet(&self, wallet_address: &str) {
        self.lock().wallet_address = Some(wallet_address.to_string()).filter(|w| !w.is_empty());
    }

    pub fn disconnect_wallet(&self) {
        self.lock().wallet_address = None;
    }

    pub fn wallet_address(&self) -> Option<String> {
        self.lock().wallet_address.clone()
    }

    pub fn wallet_consent_status(&self) -> WalletConsentStatus {
        self.lock().wallet_consent
    }

    /// Opts in to wallet tracking for `wallet_address`.
    ///
    /// Requires accepted general consent. On success the wallet is attached
    /// to the current session on the server.
    pub async fn accept_wallet_consent(&self, wallet_address: &str) -> Result<(), AnalyticsError> {
        if !self.has_consent() {
            warn!("cannot accept wallet consent without analytics consent");
            return Err(AnalyticsError::ConsentRequired);
        }
        if wallet_address.is_empty() {
            warn!("cannot accept wallet consent without a wallet address");
            return Err(AnalyticsError::WalletRequired);
        }
        {
            let mut state = self.lock();
            state.wallet_address = Some(wallet_address.to_string());
            state.wallet_consent = WalletConsentStatus::Accepted;
            state.wallet_consent_decided = true;
        }
        self.store.save_wallet_consent(WalletConsentStatus::Accepted)?;
        info!("wallet analytics consent accepted");

        self.update_session_with_wallet(wallet_address).await;
        Ok(())
    }

    pub fn decline_wallet_consent(&self) {
        {
            let mut state = self.lock();
            state.wallet_consent = WalletConsentStatus::Declined;
            state.wallet_consent_decided = true;
        }
        if let Err(e) = self.store.save_wallet_consent(WalletConsentStatus::Declined) {
            warn!(error = %e, "failed to persist wallet consent");
        }
    }

    /// Forgets the wallet consent answer; it returns to pending.
    pub fn clear_wallet_consent(&self) {
        {
            let mut state = self.lock();
            state.wallet_consent = WalletConsentStatus::Pending;
            state.wallet_consent_decided = true;
        }
        if let Err(e) = self.store.clear_wallet_consent() {
            warn!(error = %e, "failed to clear wallet consent");
        }
    }

    /// Whether to prompt for wallet consent: analytics accepted, a wallet
    /// connected, and no answer yet.
    pub fn needs_wallet_consent(&self, wallet_address: Option<&str>) -> bool {
        let state = self.lock();
        state.consent.is_accepted()
            && wallet_address.is_some_and(|w| !w.is_empty())
            && state.wallet_consent == WalletConsentStatus::Pending
    }

    pub fn has_wallet_consent(&self, wallet_address: Option<&str>) -> bool {
        let state = self.lock();
        state.consent.is_accepted()
            && wallet_address.is_some_and(|w| !w.is_empty())
            && state.wallet_consent == WalletConsentStatus::Accepted
    }
}

#[async_trait]
impl SessionRenewal for SessionManager {
    async fn renew_session(
        &self,
        previous_client_id: Option<&str>,
    ) -> Result<String, AnalyticsError> {
        if !self.has_consent() {
            return Err(AnalyticsError::ConsentRequired);
        }
        let previous_wallet = previous_client_id
            .and_then(wallet_from_client_id)
            .map(str::to_owned);

        {
            let _guard = self.establish.lock().await;
            let expired = self.lock().session_id.take();
            debug!(expired = ?expired, "renewing analytics session");
            if let Err(e) = self.store.clear_session_id() {
                warn!(error = %e, "failed to clear expired session id");
            }
            let session_id = self.request_session().await?;
            self.adopt_session(session_id)?;
        }

        if let Some(wallet) = previous_wallet {
            self.update_session_with_wallet(&wallet).await;
        }
        self.client_id().ok_or(AnalyticsError::ConsentRequired)
    }
}
