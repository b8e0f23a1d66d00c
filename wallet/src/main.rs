//! Clarity wallet: a local ledger with daily check-in rewards, simulated or
//! relay-broadcast transfers, and a block-explorer view of the connected
//! address.
//!
//! Runs either as a one-shot CLI command or as an HTTP JSON server (`serve`).
//! State lives in `<data-dir>/clarity_wallet_v1.json`.

mod app;
mod gemini;
mod hiro;
mod relay;
mod server;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use clarity_common::advisor::{AnalysisTrigger, DEFAULT_ANALYSIS_PROBABILITY};
use clarity_common::cooldown::{remaining_cooldown, CHECK_IN_COOLDOWN_MS};
use clarity_common::explorer::DEFAULT_EXPLORER_URL;
use clarity_common::reconcile::RefreshOutcome;
use clarity_common::storage::FileStore;
use clarity_common::units::{format_amount, Denomination};
use clarity_common::wallet::Transaction;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::app::{now_millis, App};
use crate::gemini::{GeminiAdvisor, DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_URL};
use crate::hiro::HiroExplorer;
use crate::relay::HttpConnector;

#[derive(Parser)]
#[command(name = "clarity-wallet", about = "Clarity local wallet ledger")]
struct Cli {
    /// Directory holding the wallet and session documents
    /// (default: <data dir>/clarity-wallet).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Address to query on chain. Overrides the connected session.
    #[arg(long, global = true, env = "CLARITY_ADDRESS")]
    address: Option<String>,

    /// Block explorer base URL.
    #[arg(long, global = true, default_value = DEFAULT_EXPLORER_URL)]
    explorer_url: String,

    /// Wallet relay endpoint used for broadcast transfers.
    #[arg(long, global = true, env = "CLARITY_CONNECTOR_URL")]
    connector_url: Option<String>,

    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    #[arg(long, global = true, default_value = DEFAULT_GEMINI_URL)]
    gemini_url: String,

    #[arg(long, global = true, default_value = DEFAULT_GEMINI_MODEL)]
    gemini_model: String,

    /// Chance (0..=1) that a transfer is followed by an activity analysis.
    #[arg(long, global = true, default_value_t = DEFAULT_ANALYSIS_PROBABILITY)]
    analysis_probability: f64,

    /// Timeout for outbound HTTP requests, in seconds.
    #[arg(long, global = true, default_value_t = 15)]
    timeout_secs: u64,

    /// Show amounts in micro-units.
    #[arg(long, global = true)]
    micro: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Balance, check-in eligibility and connection.
    Status,
    /// Claim the daily reward.
    CheckIn,
    /// Send tokens. Simulated locally unless --broadcast is given.
    Transfer {
        recipient: String,
        amount: f64,
        /// Hand the transfer to the wallet relay for signing and broadcast.
        #[arg(long)]
        broadcast: bool,
    },
    /// Fetch balance and recent history for the connected address.
    Refresh,
    /// Local history merged with chain history (refreshes first when connected).
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// AI commentary on recent activity.
    Advise,
    /// Delete all local history.
    Reset {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Remember an address as the connected wallet.
    Connect { address: String },
    /// Forget the connected wallet.
    Disconnect,
    /// Run the HTTP JSON server.
    Serve {
        #[arg(long, default_value_t = 3010)]
        port: u16,
    },
}

fn data_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(dir) = &cli.data_dir {
        return Ok(dir.clone());
    }
    let base = dirs::data_dir().context("no platform data directory; pass --data-dir")?;
    Ok(base.join("clarity-wallet"))
}

fn build_app(cli: &Cli) -> anyhow::Result<App> {
    let timeout = Duration::from_secs(cli.timeout_secs);
    let store = FileStore::new(data_dir(cli)?);
    let explorer = HiroExplorer::new(&cli.explorer_url, timeout)?;
    debug!("Using explorer at {}", explorer.base_url());
    let relay = cli
        .connector_url
        .as_deref()
        .map(|url| HttpConnector::new(url, None, timeout))
        .transpose()?;
    let advisor = GeminiAdvisor::new(
        &cli.gemini_url,
        &cli.gemini_model,
        cli.gemini_api_key.clone(),
        timeout,
    )?;
    if !advisor.has_key() {
        debug!("No Gemini API key configured; AI commentary disabled");
    }
    Ok(App::new(
        store,
        explorer,
        relay,
        advisor,
        AnalysisTrigger::new(cli.analysis_probability),
        cli.address.clone(),
    ))
}

fn format_time(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_else(|| millis.to_string())
}

fn print_transaction(tx: &Transaction, denomination: Denomination) {
    let status = tx
        .status
        .map(|s| format!(" [{}]", s.as_str()))
        .unwrap_or_default();
    let origin = if tx.is_real_chain { "chain" } else { "local" };
    println!(
        "{}  {:<10} {:>16}  {}{} ({origin}, {})",
        format_time(tx.timestamp),
        tx.kind.label(),
        format_amount(tx.amount, denomination),
        tx.description,
        status,
        tx.id
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let denomination = if cli.micro {
        Denomination::Micro
    } else {
        Denomination::Tokens
    };
    let app = build_app(&cli)?;

    match cli.command {
        Command::Status => {
            let view = app.wallet().await;
            println!("Balance:   {}", format_amount(view.state.balance, denomination));
            println!("Streak:    {} check-ins", view.streak);
            if view.can_check_in {
                println!("Check-in:  available now");
            } else {
                let left = remaining_cooldown(
                    view.state.last_check_in,
                    now_millis(),
                    CHECK_IN_COOLDOWN_MS,
                );
                println!(
                    "Check-in:  in {}h {}m",
                    left / 3_600_000,
                    (left % 3_600_000) / 60_000
                );
            }
            match &view.address {
                Some(address) => println!("Address:   {address}"),
                None => println!("Address:   not connected"),
            }
        }
        Command::CheckIn => match app.check_in().await {
            Ok(report) => {
                println!(
                    "+{} mined. Balance {}, streak {}.",
                    format_amount(report.applied.transaction.amount, denomination),
                    format_amount(report.applied.balance, denomination),
                    report.applied.streak
                );
                println!("{}", report.wisdom);
            }
            Err(e) => println!("Check-in refused: {e}"),
        },
        Command::Transfer {
            recipient,
            amount,
            broadcast,
        } => match app.transfer(&recipient, amount, broadcast).await {
            Ok(report) => {
                let tx = &report.applied.transaction;
                let kind = if tx.is_pending() {
                    "broadcast, pending confirmation"
                } else {
                    "recorded"
                };
                println!(
                    "{} {}: {} (id {}). Balance {}.",
                    tx.description,
                    kind,
                    format_amount(tx.amount, denomination),
                    tx.id,
                    format_amount(report.applied.balance, denomination)
                );
                if let Some(analysis) = report.analysis {
                    println!("{analysis}");
                }
            }
            Err(e) => println!("Transfer not sent: {e}"),
        },
        Command::Refresh => {
            let report = app.refresh().await?;
            let feed = app.feed().await;
            if let RefreshOutcome::Stale { error } = &report.outcome {
                println!("Explorer unavailable, showing last known data: {error}");
            }
            println!("Chain balance: {}", format_amount(feed.chain_balance, denomination));
            for (id, status) in &report.settled {
                println!("Settled {id}: {}", status.as_str());
            }
        }
        Command::History { limit } => {
            if app.address().await.is_some() {
                // Explorer failures surface as last_error in the feed.
                if let Err(e) = app.refresh().await {
                    warn!("History shown without a refresh: {e}");
                }
            }
            let feed = app.feed().await;
            if feed.transactions.is_empty() {
                println!("No transactions yet.");
            }
            for tx in feed.transactions.iter().take(limit) {
                print_transaction(tx, denomination);
            }
            if let Some(error) = &feed.last_error {
                println!("(chain history unavailable: {error})");
            }
        }
        Command::Advise => println!("{}", app.advise().await),
        Command::Reset { yes } => {
            if !yes {
                anyhow::bail!("reset deletes all local history; pass --yes to confirm");
            }
            app.reset().await;
            println!("Local history cleared.");
        }
        Command::Connect { address } => {
            let session = app.connect(&address).await?;
            println!(
                "Connected {} at {}",
                session.address,
                format_time(session.connected_at)
            );
            if cli.address.is_some() {
                println!("Note: --address/CLARITY_ADDRESS is set and takes precedence.");
            }
        }
        Command::Disconnect => {
            app.disconnect().await?;
            println!("Disconnected.");
        }
        Command::Serve { port } => {
            server::serve(Arc::new(app), port).await?;
        }
    }

    Ok(())
}
