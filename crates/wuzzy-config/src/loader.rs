// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./wuzzy.toml` > `~/.config/wuzzy/wuzzy.toml` > `/etc/wuzzy/wuzzy.toml`,
//! with environment variable overrides via the `WUZZY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::WuzzyConfig;

const SYSTEM_CONFIG: &str = "/etc/wuzzy/wuzzy.toml";
const LOCAL_CONFIG: &str = "wuzzy.toml";

/// Config sections, used to map `WUZZY_<SECTION>_<KEY>` onto `section.key`.
const SECTIONS: &[&str] = &["analytics", "queue", "storage", "logging"];

fn user_config() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("wuzzy/wuzzy.toml"))
        .unwrap_or_default()
}

/// Build the Figment for the standard hierarchy.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/wuzzy/wuzzy.toml`
/// 3. `~/.config/wuzzy/wuzzy.toml`
/// 4. `./wuzzy.toml`
/// 5. `WUZZY_*` environment variables
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(WuzzyConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<WuzzyConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<WuzzyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WuzzyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<WuzzyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WuzzyConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Read every config file of the hierarchy that exists, for diagnostics.
pub fn read_toml_sources() -> Vec<(String, String)> {
    let local = std::env::current_dir()
        .map(|d| d.join(LOCAL_CONFIG))
        .unwrap_or_else(|_| PathBuf::from(LOCAL_CONFIG));

    [local, user_config(), PathBuf::from(SYSTEM_CONFIG)]
        .into_iter()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}

/// Environment provider mapping only the first underscore after a known section.
///
/// `WUZZY_ANALYTICS_API_URL` must become `analytics.api_url`, not
/// `analytics.api.url`, so `Env::split("_")` cannot be used. Keys arrive as
/// written in the environment, usually upper case.
fn env_provider() -> Env {
    Env::prefixed("WUZZY_").map(|key| env_key_path(key.as_str()).into())
}

fn env_key_path(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|rest| format!("{section}.{rest}"))
        })
        .unwrap_or(key)
}
