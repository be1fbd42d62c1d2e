// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Wuzzy analytics API.
//!
//! [`AnalyticsClient`] implements [`wuzzy_core::AnalyticsTransport`] over
//! reqwest: session init, session wallet update, and batch delivery.

pub mod client;

pub use client::AnalyticsClient;
