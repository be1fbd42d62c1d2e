// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client identity strings.
//!
//! A client id is `name@version@sessionId`, optionally followed by
//! `@walletAddress` when a consented wallet is attached.

use rand::Rng;
use wuzzy_config::model::AnalyticsConfig;

const SEPARATOR: char = '@';
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Client name and version reported to the analytics API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub name: String,
    pub version: String,
}

impl ClientIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(&config.client_name, &config.client_version)
    }

    /// Builds the client id for `session_id`, with the wallet suffix if given.
    pub fn client_id(&self, session_id: &str, wallet_address: Option<&str>) -> String {
        match wallet_address {
            Some(wallet) => format!(
                "{}{SEPARATOR}{}{SEPARATOR}{session_id}{SEPARATOR}{wallet}",
                self.name, self.version
            ),
            None => format!("{}{SEPARATOR}{}{SEPARATOR}{session_id}", self.name, self.version),
        }
    }
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }
}

/// Wallet address carried by a four-part client id.
pub fn wallet_from_client_id(client_id: &str) -> Option<&str> {
    let parts: Vec<&str> = client_id.split(SEPARATOR).collect();
    match parts.as_slice() {
        [_, _, _, wallet] if !wallet.is_empty() => Some(wallet),
        _ => None,
    }
}

/// Local session id used when no analytics endpoint is configured.
pub fn fallback_session_id(now_millis: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("fallback-{now_millis}-{suffix}")
}
