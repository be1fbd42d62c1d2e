// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seam traits for the collaborators the pipeline does not own.
//!
//! Storage and scheduling are synchronous; the HTTP transport and session
//! renewal use `#[async_trait]` so they can be held as trait objects.

pub mod clock;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod transport;

pub use clock::{Clock, SystemClock};
pub use scheduler::{Scheduler, TimerId};
pub use session::SessionRenewal;
pub use store::KeyValueStore;
pub use transport::{AnalyticsTransport, SessionInitRequest};
