// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timer scheduling abstraction.

use std::time::Duration;

use strum::Display;

/// The timers a delivery queue can have pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TimerId {
    /// Periodic flush armed after an `add` below batch size.
    Flush,
    /// Backoff timer armed after a failed delivery.
    Retry,
}

/// Arms and cancels one-shot timers.
///
/// When a timer fires, the owner of the scheduler is expected to call back
/// into the queue with the same [`TimerId`]. Scheduling a timer that is
/// already pending replaces it.
pub trait Scheduler: Send + Sync + 'static {
    fn schedule_after(&self, delay: Duration, timer: TimerId);

    /// Cancels a pending timer. Cancelling an idle timer is a no-op.
    fn cancel(&self, timer: TimerId);
}
