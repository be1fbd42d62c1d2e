// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable delivery queue for analytics events.
//!
//! Events are persisted on every mutation, sent in batches, and retried with
//! bounded exponential backoff. Timers go through the
//! [`Scheduler`](wuzzy_core::Scheduler) seam; [`TokioScheduler`] plus
//! [`spawn_timer_driver`] is the production wiring.

pub mod backoff;
pub mod queue;
pub mod scheduler;

pub use backoff::{BackoffPolicy, MAX_RETRY_AFTER};
pub use queue::{DeliveryQueue, QueuePhase};
pub use scheduler::{spawn_timer_driver, FiredTimers, TokioScheduler};
