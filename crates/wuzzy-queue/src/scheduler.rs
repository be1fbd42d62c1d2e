// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tokio-backed timers for the delivery queue.
//!
//! Each armed timer is a sleeping task guarded by its own
//! [`CancellationToken`] and tagged with a sequence number. Fired timers are
//! reported on a channel and only delivered by [`FiredTimers::recv`] while
//! their sequence number is still the armed one, so a firing that raced with
//! a cancel or re-arm is dropped. The driver task spawned by
//! [`spawn_timer_driver`] feeds them back into the queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use wuzzy_core::{Scheduler, TimerId};

use crate::queue::DeliveryQueue;

struct Armed {
    seq: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct Pending {
    next_seq: u64,
    armed: HashMap<TimerId, Armed>,
}

type SharedPending = Arc<Mutex<Pending>>;

fn lock(pending: &SharedPending) -> MutexGuard<'_, Pending> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`Scheduler`] that sleeps on the tokio runtime.
///
/// Must be used from within a runtime: arming a timer spawns a task.
pub struct TokioScheduler {
    pending: SharedPending,
    fired: mpsc::UnboundedSender<(TimerId, u64)>,
}

impl TokioScheduler {
    /// Creates the scheduler and the receiver its fired timers arrive on.
    pub fn new() -> (Self, FiredTimers) {
        let (fired, rx) = mpsc::unbounded_channel();
        let pending = SharedPending::default();
        let scheduler = Self {
            pending: pending.clone(),
            fired,
        };
        (scheduler, FiredTimers { rx, pending })
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, timer: TimerId) {
        let token = CancellationToken::new();
        let seq = {
            let mut pending = lock(&self.pending);
            pending.next_seq += 1;
            let seq = pending.next_seq;
            let armed = Armed {
                seq,
                token: token.clone(),
            };
            if let Some(previous) = pending.armed.insert(timer, armed) {
                previous.token.cancel();
            }
            seq
        };

        let fired = self.fired.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // The receiver is gone once the driver has shut down.
                    let _ = fired.send((timer, seq));
                }
            }
        });
        debug!(%timer, seq, delay_ms = delay.as_millis() as u64, "timer armed");
    }

    fn cancel(&self, timer: TimerId) {
        if let Some(armed) = lock(&self.pending).armed.remove(&timer) {
            armed.token.cancel();
            debug!(%timer, "timer cancelled");
        }
    }
}

/// Receiving end of a [`TokioScheduler`].
pub struct FiredTimers {
    rx: mpsc::UnboundedReceiver<(TimerId, u64)>,
    pending: SharedPending,
}

impl FiredTimers {
    /// Next timer that fired while still armed. `None` once the scheduler is
    /// dropped.
    pub async fn recv(&mut self) -> Option<TimerId> {
        loop {
            let (timer, seq) = self.rx.recv().await?;
            let mut pending = lock(&self.pending);
            if pending.armed.get(&timer).is_some_and(|armed| armed.seq == seq) {
                pending.armed.remove(&timer);
                return Some(timer);
            }
            debug!(%timer, seq, "dropping superseded timer firing");
        }
    }
}

/// Delivers fired timers to `queue` until `shutdown` is cancelled or the
/// scheduler is dropped.
pub fn spawn_timer_driver(
    queue: Arc<DeliveryQueue>,
    mut fired: FiredTimers,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("timer driver shutting down");
                    break;
                }
                next = fired.recv() => match next {
                    Some(timer) => queue.on_timer(timer).await,
                    None => break,
                },
            }
        }
    })
}
