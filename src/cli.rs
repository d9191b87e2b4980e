use clap::{Parser, Subcommand, builder::PossibleValuesParser};
use std::{net::SocketAddr, path::PathBuf};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::{
    api::router,
    orders::MarketType,
    service::default_window,
    state::AppState,
    time::{align_millis, from_epoch_millis},
    utils::shutdown_token,
};

/// Electricity order service
#[derive(Parser)]
#[command(name = "electricity-orders")]
#[command(version, about = "CRUD service for quarter-hour electricity orders")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,

        /// Persist orders in a ParityDB here (in-memory when omitted)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Print the quarter-aligned start for an epoch-ms timestamp
    Align {
        /// Epoch milliseconds (UTC)
        #[arg(allow_negative_numbers = true)]
        millis: i64,
    },
    /// Print the default window a new order would get right now
    Window {
        /// dah or intraday
        #[arg(value_parser = PossibleValuesParser::new(["dah", "intraday"]))]
        market: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // a second init (e.g. from tests) is harmless
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn serve(addr: SocketAddr, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let state = match &data_dir {
        Some(dir) => AppState::persistent(dir)?,
        None => AppState::in_memory(),
    };
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, data_dir = ?data_dir, "serving orders api");

    let token = shutdown_token();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            token.cancelled().await;
            tracing::info!("👍 received shutdown, stopping server…");
        })
        .await?;
    Ok(())
}

fn handle_align(millis: i64) -> anyhow::Result<()> {
    let aligned = align_millis(millis)
        .ok_or_else(|| anyhow::anyhow!("timestamp {} is out of range", millis))?;
    let shown = from_epoch_millis(aligned)
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_default();
    println!("{} ({})", aligned, shown);
    Ok(())
}

fn handle_window(market: Option<String>) {
    let market = match market.as_deref() {
        Some("dah") => Some(MarketType::Dah),
        Some("intraday") => Some(MarketType::Intraday),
        _ => None,
    };
    let (start, end) = default_window(market, chrono::Utc::now());
    println!("start={} end={}", start, end);
}

pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        Commands::Serve { addr, data_dir } => serve(addr, data_dir).await,
        Commands::Align { millis } => handle_align(millis),
        Commands::Window { market } => {
            handle_window(market);
            Ok(())
        }
    }
}
