// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wuzzy - consent-aware search analytics.
//!
//! This binary drives the analytics pipeline against the configured store and
//! API: inspect state, record consent decisions, submit queries, flush.

mod status;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use wuzzy_core::{AnalyticsError, ApplicationType};
use wuzzy_tracker::Analytics;

/// How long a pending batch may take to send before the process exits.
const EXIT_FLUSH_LIMIT: Duration = Duration::from_secs(5);

/// Wuzzy - consent-aware search analytics.
#[derive(Parser, Debug)]
#[command(name = "wuzzy", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show consent, session and queue state.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Record or reset the analytics consent decision.
    Consent {
        #[command(subcommand)]
        action: ConsentAction,
    },
    /// Manage the connected wallet and its consent.
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
    /// Track a search query.
    Submit {
        /// Text the user searched for.
        query: String,
        /// Search context the query came from.
        #[arg(long, default_value = "graphql-images")]
        application: ApplicationType,
        /// Ids of the results shown, in order.
        #[arg(long = "hit", value_name = "ID")]
        hits: Vec<String>,
        /// Extra attribute as KEY=JSON; plain strings are accepted as-is.
        #[arg(long = "attr", value_name = "KEY=VALUE", value_parser = parse_attribute)]
        attributes: Vec<(String, serde_json::Value)>,
    },
    /// Send queued queries now.
    Flush,
    /// Delete all locally stored analytics data.
    Clear,
}

#[derive(Subcommand, Debug)]
enum ConsentAction {
    Accept,
    Decline,
    /// Forget the decision along with all stored analytics data.
    Clear,
}

#[derive(Subcommand, Debug)]
enum WalletAction {
    /// Remember a connected wallet address.
    Connect { address: String },
    Disconnect,
    /// Consent to linking `address` to the analytics session.
    Accept { address: String },
    Decline,
}

fn parse_attribute(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    if key.is_empty() {
        return Err("attribute key must not be empty".into());
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => wuzzy_config::load_and_validate_path(path),
        None => wuzzy_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            wuzzy_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.logging.level);

    let analytics = match Analytics::builder(config).build() {
        Ok(analytics) => analytics,
        Err(e) => {
            error!(error = %e, "failed to start analytics");
            eprintln!("wuzzy: {e}");
            return ExitCode::FAILURE;
        }
    };
    let shutdown = CancellationToken::new();
    let driver = analytics.spawn_timer_driver(shutdown.clone());
    analytics.initialize().await;

    let result = tokio::select! {
        result = run(&analytics, cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(())
        }
    };

    analytics.flush_before_exit(EXIT_FLUSH_LIMIT).await;
    shutdown.cancel();
    if let Some(driver) = driver {
        let _ = driver.await;
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("wuzzy: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(analytics: &Analytics, command: Commands) -> Result<(), AnalyticsError> {
    match command {
        Commands::Status { json } => status::run_status(analytics, json)?,
        Commands::Consent { action } => match action {
            ConsentAction::Accept => {
                analytics.accept_consent().await;
                println!("analytics consent: {}", analytics.consent_status());
            }
            ConsentAction::Decline => {
                analytics.decline_consent();
                println!("analytics consent: {}", analytics.consent_status());
            }
            ConsentAction::Clear => {
                analytics.clear_all_data();
                println!("analytics data cleared");
            }
        },
        Commands::Wallet { action } => match action {
            WalletAction::Connect { address } => {
                analytics.connect_wallet(&address);
                println!("wallet connected: {address}");
            }
            WalletAction::Disconnect => {
                analytics.disconnect_wallet();
                println!("wallet disconnected");
            }
            WalletAction::Accept { address } => {
                analytics.accept_wallet_consent(&address).await?;
                println!("wallet consent: {}", analytics.wallet_consent_status());
            }
            WalletAction::Decline => {
                analytics.decline_wallet_consent();
                println!("wallet consent: {}", analytics.wallet_consent_status());
            }
        },
        Commands::Submit {
            query,
            application,
            hits,
            attributes,
        } => {
            let attributes: BTreeMap<_, _> = attributes.into_iter().collect();
            let attributes = (!attributes.is_empty()).then_some(attributes);
            let query_id = analytics
                .track_query(application, &query, hits, attributes)
                .await;
            if !analytics.has_consent() {
                info!("analytics consent not accepted, query was not recorded");
            }
            println!("{query_id}");
        }
        Commands::Flush => {
            let before = analytics.queue_len();
            analytics.flush().await;
            println!(
                "flushed: {} sent, {} still queued",
                before.saturating_sub(analytics.queue_len()),
                analytics.queue_len()
            );
        }
        Commands::Clear => {
            analytics.clear_all_data();
            println!("analytics data cleared");
        }
    }
    Ok(())
}

/// Initialize the tracing subscriber with an env filter.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wuzzy={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
