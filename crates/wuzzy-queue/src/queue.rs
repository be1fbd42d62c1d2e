// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batching delivery queue state machine.
//!
//! Phases: `Idle` -> `Scheduled` (flush timer armed) -> `Flushing` (batch in
//! flight) -> `Idle` on success, or `Backoff` (retry timer armed) on a
//! recoverable failure. Exhausting the retry budget drops the queue.
//!
//! Every mutation is persisted before the lock is released. The lock is never
//! held across a network call; a flush sends a snapshot, and events added
//! while it is in flight stay queued for the next one. [`DeliveryQueue::clear`]
//! bumps a generation counter so a response that arrives afterwards is
//! ignored instead of mutating the cleared queue.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use strum::Display;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wuzzy_config::model::QueueConfig;
use wuzzy_core::{
    AnalyticsTransport, BatchOutcome, Clock, RetryState, Scheduler, SessionRenewal, TimerId,
    UbiQuery,
};
use wuzzy_storage::StateStore;

use crate::backoff::BackoffPolicy;

/// Externally visible state of a [`DeliveryQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum QueuePhase {
    /// Nothing pending.
    Idle,
    /// Flush timer armed.
    Scheduled,
    /// A batch request is in flight.
    Flushing,
    /// Waiting on the retry timer after a failure.
    Backoff,
}

#[derive(Debug, Default)]
struct QueueState {
    initialized: bool,
    items: VecDeque<UbiQuery>,
    retry: RetryState,
    flushing: bool,
    flush_armed: bool,
    retry_armed: bool,
    generation: u64,
}

/// Durable FIFO of analytics events with batched, retried delivery.
pub struct DeliveryQueue {
    config: QueueConfig,
    backoff: BackoffPolicy,
    store: StateStore,
    transport: Option<Arc<dyn AnalyticsTransport>>,
    renewal: Option<Arc<dyn SessionRenewal>>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
}

impl DeliveryQueue {
    /// `transport` is `None` when no analytics endpoint is configured; events
    /// are then kept but never sent.
    pub fn new(
        config: QueueConfig,
        store: StateStore,
        transport: Option<Arc<dyn AnalyticsTransport>>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backoff: BackoffPolicy::from_config(&config),
            config,
            store,
            transport,
            renewal: None,
            scheduler,
            clock,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Enables renewal of expired sessions before falling back to backoff.
    pub fn with_session_renewal(mut self, renewal: Arc<dyn SessionRenewal>) -> Self {
        self.renewal = Some(renewal);
        self
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Restores the persisted queue and resumes a pending backoff.
    ///
    /// A retry due in the future is re-armed for the time remaining; one
    /// already due is armed immediately if events are waiting.
    pub fn initialize(&self) {
        let mut state = self.lock();
        if state.initialized {
            return;
        }
        state.initialized = true;
        state.items = self.store.load_queue(self.config.max_queue_size);
        state.retry = self.store.load_retry_state().unwrap_or_default();
        info!(
            queued = state.items.len(),
            attempts = state.retry.attempts,
            "delivery queue restored"
        );

        if let Some(next_retry_at) = state.retry.next_retry_at {
            let remaining = next_retry_at.saturating_sub(self.clock.now_millis());
            if remaining > 0 || !state.items.is_empty() {
                let remaining = Duration::from_millis(remaining.max(0) as u64);
                let delay = self
                    .backoff
                    .delay_with_hint(state.retry.attempts, Some(remaining));
                self.arm_retry(&mut state, delay);
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Copy of the queued events, oldest first.
    pub fn snapshot(&self) -> Vec<UbiQuery> {
        self.lock().items.iter().cloned().collect()
    }

    pub fn retry_state(&self) -> RetryState {
        self.lock().retry
    }

    pub fn phase(&self) -> QueuePhase {
        let state = self.lock();
        if state.flushing {
            QueuePhase::Flushing
        } else if state.retry_armed {
            QueuePhase::Backoff
        } else if state.flush_armed {
            QueuePhase::Scheduled
        } else {
            QueuePhase::Idle
        }
    }

    /// Appends an event, flushing at once if a full batch is waiting.
    ///
    /// Below batch size this arms the flush timer unless a timer that will
    /// flush is already pending.
    pub async fn add(&self, event: UbiQuery) {
        let flush_now = {
            let mut state = self.lock();
            if !state.initialized {
                debug!("delivery queue not initialized, skipping event");
                return;
            }
            state.items.push_back(event);
            let excess = state.items.len().saturating_sub(self.config.max_queue_size);
            if excess > 0 {
                state.items.drain(..excess);
                debug!(dropped = excess, "delivery queue full, dropped oldest events");
            }
            self.persist_items(&mut state);

            if state.items.len() >= self.config.batch_size {
                true
            } else {
                if !state.retry_armed {
                    self.arm_flush(&mut state);
                }
                false
            }
        };

        if flush_now {
            self.flush().await;
        }
    }

    /// Sends every queued event as one batch and handles the response.
    pub async fn flush(&self) {
        let (transport, batch, generation) = {
            let mut state = self.lock();
            self.disarm_flush(&mut state);

            let Some(transport) = self.transport.clone() else {
                debug!("analytics API not configured, skipping flush");
                return;
            };
            if state.flushing {
                debug!("flush already in flight");
                return;
            }
            if state.items.is_empty() {
                return;
            }
            state.flushing = true;
            let batch: Vec<UbiQuery> = state.items.iter().cloned().collect();
            (transport, batch, state.generation)
        };

        debug!(events = batch.len(), "sending analytics batch");
        let outcome = transport.send_batch(&batch).await;

        match outcome {
            BatchOutcome::Success => self.complete(&batch, generation),
            BatchOutcome::SessionExpired { message } => {
                warn!(reason = %message, "analytics session expired, renewing");
                self.renew_and_resend(transport.as_ref(), batch, generation)
                    .await;
            }
            BatchOutcome::ValidationError { message } => {
                self.drop_invalid(&batch, generation, &message);
            }
            BatchOutcome::Retryable {
                reason,
                retry_after,
            } => self.enter_backoff(generation, retry_after, &reason),
            BatchOutcome::Unknown { status, reason } => {
                debug!(status = ?status, "unclassified analytics error");
                self.enter_backoff(generation, None, &reason);
            }
        }
    }

    /// Entry point for a fired timer. Stale firings are ignored.
    pub async fn on_timer(&self, timer: TimerId) {
        {
            let mut state = self.lock();
            let armed = match timer {
                TimerId::Flush => &mut state.flush_armed,
                TimerId::Retry => &mut state.retry_armed,
            };
            if !*armed {
                debug!(%timer, "ignoring stale timer");
                return;
            }
            *armed = false;
        }
        debug!(%timer, "timer fired");
        self.flush().await;
    }

    /// Best-effort flush that does not hold up the caller, for shutdown and
    /// page-hide style signals.
    pub fn flush_on_teardown(self: &Arc<Self>) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            queue.flush().await;
        })
    }

    /// Drops every queued event and the retry state, and cancels all timers.
    pub fn clear(&self) {
        let mut state = self.lock();
        let dropped = state.items.len();
        state.items.clear();
        state.retry = RetryState::default();
        state.generation += 1;
        state.flushing = false;
        self.disarm_flush(&mut state);
        self.disarm_retry(&mut state);
        if let Err(e) = self.store.clear_queue() {
            warn!(error = %e, "failed to clear persisted analytics queue");
        }
        if let Err(e) = self.store.clear_retry_state() {
            warn!(error = %e, "failed to clear persisted retry state");
        }
        info!(dropped, "analytics queue cleared");
    }

    // --- response handling ---

    /// Locks the state and releases the in-flight marker, unless the queue
    /// was cleared since `generation`.
    fn lock_current(&self, generation: u64) -> Option<MutexGuard<'_, QueueState>> {
        let mut state = self.lock();
        if state.generation != generation {
            debug!("queue cleared during flush, ignoring response");
            return None;
        }
        state.flushing = false;
        Some(state)
    }

    fn complete(&self, batch: &[UbiQuery], generation: u64) {
        let Some(mut state) = self.lock_current(generation) else {
            return;
        };
        remove_sent(&mut state.items, batch);
        self.reset_retry(&mut state);
        self.persist_items(&mut state);
        info!(
            sent = batch.len(),
            remaining = state.items.len(),
            "analytics batch delivered"
        );
        if !state.items.is_empty() {
            self.arm_flush(&mut state);
        }
    }

    fn drop_invalid(&self, batch: &[UbiQuery], generation: u64, reason: &str) {
        let Some(mut state) = self.lock_current(generation) else {
            return;
        };
        remove_sent(&mut state.items, batch);
        self.reset_retry(&mut state);
        self.persist_items(&mut state);
        warn!(
            dropped = batch.len(),
            reason, "analytics batch rejected as invalid, dropping it"
        );
        if !state.items.is_empty() {
            self.arm_flush(&mut state);
        }
    }

    async fn renew_and_resend(
        &self,
        transport: &dyn AnalyticsTransport,
        batch: Vec<UbiQuery>,
        generation: u64,
    ) {
        let Some(renewal) = self.renewal.clone() else {
            self.enter_backoff(generation, None, "session expired and renewal unavailable");
            return;
        };

        let previous = batch.first().map(|q| q.client_id.clone());
        let client_id = match renewal.renew_session(previous.as_deref()).await {
            Ok(client_id) => client_id,
            Err(e) => {
                warn!(error = %e, "analytics session renewal failed");
                self.enter_backoff(generation, None, "session renewal failed");
                return;
            }
        };

        let resend: Vec<UbiQuery> = {
            let mut state = self.lock();
            if state.generation != generation {
                debug!("queue cleared during session renewal, ignoring");
                return;
            }
            for item in state.items.iter_mut() {
                item.client_id.clone_from(&client_id);
            }
            self.persist_items(&mut state);
            batch
                .into_iter()
                .map(|mut q| {
                    q.client_id.clone_from(&client_id);
                    q
                })
                .collect()
        };

        info!(client_id = %client_id, events = resend.len(), "resending batch with renewed session");
        match transport.send_batch(&resend).await {
            BatchOutcome::Success => self.complete(&resend, generation),
            failure => {
                warn!(outcome = ?failure, "resend after session renewal failed");
                self.enter_backoff(generation, failure.retry_after(), "resend after renewal failed");
            }
        }
    }

    fn enter_backoff(&self, generation: u64, retry_after: Option<Duration>, reason: &str) {
        let Some(mut state) = self.lock_current(generation) else {
            return;
        };
        state.retry.attempts += 1;
        let attempts = state.retry.attempts;

        if self.backoff.is_exhausted(attempts) {
            warn!(
                attempts,
                dropped = state.items.len(),
                reason,
                "analytics delivery failed too many times, dropping queue"
            );
            state.items.clear();
            self.reset_retry(&mut state);
            self.disarm_flush(&mut state);
            self.persist_items(&mut state);
            return;
        }

        let delay = self.backoff.delay_with_hint(attempts, retry_after);
        state.retry.next_retry_at = Some(retry_deadline(self.clock.now_millis(), delay));
        if let Err(e) = self.store.save_retry_state(&state.retry) {
            debug!(error = %e, "failed to persist retry state");
        }
        self.disarm_flush(&mut state);
        self.arm_retry(&mut state, delay);
        warn!(
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            reason,
            "analytics delivery failed, backing off"
        );
    }

    // --- helpers; all called with the state lock held ---

    fn reset_retry(&self, state: &mut QueueState) {
        state.retry = RetryState::default();
        self.disarm_retry(state);
        if let Err(e) = self.store.clear_retry_state() {
            debug!(error = %e, "failed to clear retry state");
        }
    }

    fn persist_items(&self, state: &mut QueueState) {
        match self.store.save_queue(&mut state.items) {
            Ok(0) => {}
            Ok(dropped) => debug!(dropped, "trimmed analytics queue to fit storage"),
            Err(e) => debug!(error = %e, "failed to persist analytics queue"),
        }
    }

    fn arm_flush(&self, state: &mut QueueState) {
        if !state.flush_armed {
            self.scheduler
                .schedule_after(self.config.flush_interval(), TimerId::Flush);
            state.flush_armed = true;
        }
    }

    fn disarm_flush(&self, state: &mut QueueState) {
        if state.flush_armed {
            self.scheduler.cancel(TimerId::Flush);
            state.flush_armed = false;
        }
    }

    fn arm_retry(&self, state: &mut QueueState, delay: Duration) {
        self.scheduler.schedule_after(delay, TimerId::Retry);
        state.retry_armed = true;
    }

    fn disarm_retry(&self, state: &mut QueueState) {
        if state.retry_armed {
            self.scheduler.cancel(TimerId::Retry);
            state.retry_armed = false;
        }
    }
}

/// Absolute retry deadline in epoch milliseconds, saturating at `i64::MAX`.
fn retry_deadline(now_millis: i64, delay: Duration) -> i64 {
    i64::try_from(delay.as_millis())
        .ok()
        .and_then(|delay| now_millis.checked_add(delay))
        .unwrap_or(i64::MAX)
}

/// Removes the events of `batch` from `items`, keeping anything added since.
fn remove_sent(items: &mut VecDeque<UbiQuery>, batch: &[UbiQuery]) {
    let sent: HashSet<Uuid> = batch.iter().map(|q| q.query_id).collect();
    items.retain(|q| !sent.contains(&q.query_id));
}
