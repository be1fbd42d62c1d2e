// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search query tracking for the Wuzzy site.
//!
//! [`Analytics`] is the one object a host constructs. It wires the session
//! manager and delivery queue to a store, transport, clock and scheduler,
//! and exposes consent handling plus [`Analytics::submit_query`], which never
//! fails the caller.

pub mod analytics;
pub mod builder;

pub use analytics::Analytics;
pub use builder::AnalyticsBuilder;
pub use wuzzy_queue::QueuePhase;
