// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consent and session management for the Wuzzy analytics pipeline.
//!
//! [`SessionManager`] owns the user's analytics consent, the analytics session
//! id, and the optional wallet association. It composes the client identity
//! stamped on every queued event and renews the session when the delivery
//! queue reports that the server expired it.

pub mod identity;
pub mod manager;

pub use identity::ClientIdentity;
pub use manager::SessionManager;
