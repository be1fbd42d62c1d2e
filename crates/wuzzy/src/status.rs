// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wuzzy status` command implementation.

use serde::Serialize;
use wuzzy_core::{AnalyticsError, ConsentStatus, RetryState, WalletConsentStatus};
use wuzzy_tracker::Analytics;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub consent: ConsentStatus,
    pub session_id: Option<String>,
    pub client_id: Option<String>,
    pub wallet_address: Option<String>,
    pub wallet_consent: WalletConsentStatus,
    pub queue_len: usize,
    pub queue_phase: String,
    pub retry: RetryState,
}

impl StatusReport {
    pub fn collect(analytics: &Analytics) -> Self {
        Self {
            consent: analytics.consent_status(),
            session_id: analytics.session_id(),
            client_id: analytics.client_id(),
            wallet_address: analytics.wallet_address(),
            wallet_consent: analytics.wallet_consent_status(),
            queue_len: analytics.queue_len(),
            queue_phase: analytics.queue_phase().to_string(),
            retry: analytics.retry_state(),
        }
    }

    fn render(&self) -> String {
        let none = || "-".to_string();
        let mut lines = vec![
            format!("consent:         {}", self.consent),
            format!("session:         {}", self.session_id.clone().unwrap_or_else(none)),
            format!("client id:       {}", self.client_id.clone().unwrap_or_else(none)),
            format!("wallet:          {}", self.wallet_address.clone().unwrap_or_else(none)),
            format!("wallet consent:  {}", self.wallet_consent),
            format!("queued queries:  {} ({})", self.queue_len, self.queue_phase),
        ];
        if self.retry.attempts > 0 {
            let next = self
                .retry
                .next_retry_at
                .map_or_else(none, |at| at.to_string());
            lines.push(format!(
                "retry:           attempt {} (next at {next} ms)",
                self.retry.attempts
            ));
        }
        lines.join("\n")
    }
}

/// Run the `wuzzy status` command.
pub fn run_status(analytics: &Analytics, json: bool) -> Result<(), AnalyticsError> {
    let report = StatusReport::collect(analytics);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render());
    }
    Ok(())
}
