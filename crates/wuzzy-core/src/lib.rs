// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Wuzzy analytics pipeline.
//!
//! This crate provides the error types, wire types, and seam traits shared by
//! the storage, transport, session, and queue crates. Everything that talks to
//! the outside world (key-value storage, HTTP, timers, the wall clock) is
//! reached through a trait defined here so it can be swapped in tests.

pub mod error;
pub mod outcome;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{AnalyticsError, SessionInitError, StoreError};
pub use outcome::BatchOutcome;
pub use types::{
    ApplicationType, ConsentStatus, ErrorAction, ErrorCode, ErrorEnvelope, RetryState,
    SessionInitResponse, UbiQuery, WalletConsentStatus,
};

pub use traits::{
    AnalyticsTransport, Clock, KeyValueStore, Scheduler, SessionInitRequest, SessionRenewal,
    SystemClock, TimerId,
};
