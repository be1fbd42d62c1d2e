// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles for the Wuzzy analytics pipeline.
//!
//! Provides deterministic stand-ins for every external collaborator so the
//! session and queue state machines can be driven step by step.
//!
//! # Components
//!
//! - [`MockTransport`] - scripted analytics API with request capture
//! - [`ManualScheduler`] - records armed timers; tests fire them by hand
//! - [`FixedClock`] - wall clock that only moves when told to
//! - [`sample_query`] - `UbiQuery` fixture builder

pub mod clock;
pub mod fixtures;
pub mod mock_transport;
pub mod scheduler;

pub use clock::FixedClock;
pub use fixtures::sample_query;
pub use mock_transport::{BatchGate, MockTransport};
pub use scheduler::ManualScheduler;
