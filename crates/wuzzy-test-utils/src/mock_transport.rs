// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock analytics API for deterministic testing.
//!
//! `MockTransport` implements `AnalyticsTransport` with scripted responses,
//! recording every request so tests can assert exactly what was sent.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use wuzzy_core::{
    AnalyticsError, AnalyticsTransport, BatchOutcome, SessionInitError, SessionInitRequest,
    SessionInitResponse, UbiQuery,
};

/// Holds the next batch request in flight until released.
#[derive(Clone)]
pub struct BatchGate {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl BatchGate {
    /// Resolves once the held batch request has been sent.
    pub async fn started(&self) {
        self.started.notified().await;
    }

    /// Lets the held request complete.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// A scripted analytics API.
///
/// Batch outcomes and session responses are popped from FIFO queues. When a
/// queue is empty, batches succeed and sessions are issued as `session-N`.
#[derive(Default)]
pub struct MockTransport {
    batch_outcomes: Mutex<VecDeque<BatchOutcome>>,
    session_responses: Mutex<VecDeque<Result<SessionInitResponse, SessionInitError>>>,
    update_failures: Mutex<VecDeque<String>>,
    batches: Mutex<Vec<Vec<UbiQuery>>>,
    session_requests: Mutex<Vec<SessionInitRequest>>,
    session_updates: Mutex<Vec<(String, String)>>,
    gate: Mutex<Option<BatchGate>>,
    issued_sessions: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for the next batch requests.
    pub fn push_batch_outcomes(&self, outcomes: impl IntoIterator<Item = BatchOutcome>) {
        self.batch_outcomes.lock().unwrap().extend(outcomes);
    }

    /// Fail the next `n` batches with a retryable error.
    pub fn fail_next_batches(&self, n: usize) {
        self.push_batch_outcomes((0..n).map(|i| BatchOutcome::transport_failure(format!("down {i}"))));
    }

    /// Queue a response for the next session init request.
    pub fn push_session_response(&self, response: Result<SessionInitResponse, SessionInitError>) {
        self.session_responses.lock().unwrap().push_back(response);
    }

    /// Make the next session update fail.
    pub fn fail_next_update(&self, reason: &str) {
        self.update_failures.lock().unwrap().push_back(reason.to_string());
    }

    /// Hold the next batch request until the returned gate is released.
    pub fn hold_next_batch(&self) -> BatchGate {
        let gate = BatchGate {
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Every batch sent so far.
    pub fn batches(&self) -> Vec<Vec<UbiQuery>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn session_requests(&self) -> Vec<SessionInitRequest> {
        self.session_requests.lock().unwrap().clone()
    }

    /// `(session_id, wallet_address)` for every session update.
    pub fn session_updates(&self) -> Vec<(String, String)> {
        self.session_updates.lock().unwrap().clone()
    }
}

/// A successful session response for `session_id`.
pub fn session_response(session_id: &str) -> SessionInitResponse {
    SessionInitResponse {
        session_id: session_id.to_string(),
        client_id: format!("wuzzy-site@1.0.0@{session_id}"),
        message: None,
    }
}

#[async_trait]
impl AnalyticsTransport for MockTransport {
    async fn init_session(
        &self,
        request: &SessionInitRequest,
    ) -> Result<SessionInitResponse, SessionInitError> {
        self.session_requests.lock().unwrap().push(request.clone());
        let scripted = self.session_responses.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            let n = self.issued_sessions.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(session_response(&format!("session-{n}")))
        })
    }

    async fn update_session(
        &self,
        session_id: &str,
        wallet_address: &str,
    ) -> Result<(), AnalyticsError> {
        self.session_updates
            .lock()
            .unwrap()
            .push((session_id.to_string(), wallet_address.to_string()));
        match self.update_failures.lock().unwrap().pop_front() {
            Some(reason) => Err(AnalyticsError::Transport {
                message: reason,
                source: None,
            }),
            None => Ok(()),
        }
    }

    async fn send_batch(&self, queries: &[UbiQuery]) -> BatchOutcome {
        self.batches.lock().unwrap().push(queries.to_vec());

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }

        self.batch_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(BatchOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SessionInitRequest {
        SessionInitRequest {
            client_name: "wuzzy-site".into(),
            client_version: "1.0.0".into(),
            wallet_address: None,
        }
    }

    #[tokio::test]
    async fn issues_sequential_sessions_by_default() {
        let transport = MockTransport::new();
        assert_eq!(
            transport.init_session(&request()).await.unwrap().session_id,
            "session-1"
        );
        assert_eq!(
            transport.init_session(&request()).await.unwrap().session_id,
            "session-2"
        );
        assert_eq!(transport.session_requests().len(), 2);
    }

    #[tokio::test]
    async fn scripted_outcomes_then_success() {
        let transport = MockTransport::new();
        transport.fail_next_batches(1);
        assert!(matches!(
            transport.send_batch(&[]).await,
            BatchOutcome::Retryable { .. }
        ));
        assert!(transport.send_batch(&[]).await.is_success());
        assert_eq!(transport.batch_count(), 2);
    }

    #[tokio::test]
    async fn gate_holds_batch_until_released() {
        let transport = Arc::new(MockTransport::new());
        let gate = transport.hold_next_batch();

        let sender = transport.clone();
        let handle = tokio::spawn(async move { sender.send_batch(&[]).await });

        gate.started().await;
        assert_eq!(transport.batch_count(), 1);
        assert!(!handle.is_finished());
        gate.release();
        assert!(handle.await.unwrap().is_success());
    }
}
