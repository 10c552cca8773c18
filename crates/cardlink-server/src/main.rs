//! Cardlink Server - pairs RFID scanner posts with web registrations.
//!
//! Serves the registration page, the browser's status polling endpoint and
//! the scanner's link endpoint over one HTTP listener.

mod handler;
mod page;
mod server;
mod session;

use anyhow::{bail, Context, Result};
use cardlink_core::config::AppConfig;
use cardlink_core::{
    CardlinkApi, LinkingConfig, MemoryRowStore, PersistenceGateway, ServerConfig, SheetConfig,
    SheetsRowStore, SqliteRowStore,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Where registration rows are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Process memory; rows vanish on exit
    Memory,
    /// Local SQLite file
    Sqlite,
    /// Google Sheets worksheet
    Sheets,
}

#[derive(Parser, Debug)]
#[command(name = "cardlink-server")]
#[command(about = "Links RFID card scans to pending web registrations")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value_t = ServerConfig::DEFAULT_PORT)]
    port: u16,

    /// Host to bind to (the scanner must be able to reach it)
    #[arg(long, default_value = ServerConfig::DEFAULT_HOST)]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Seconds a registration waits for its card
    #[arg(long, default_value_t = LinkingConfig::DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Seconds between background sweeps of expired registrations (0 = off)
    #[arg(long, default_value_t = LinkingConfig::DEFAULT_SWEEP_INTERVAL.as_secs())]
    sweep_interval_secs: u64,

    /// Row store backend
    #[arg(long, value_enum, default_value_t = StoreKind::Sheets)]
    store: StoreKind,

    /// SQLite database file (sqlite store)
    #[arg(long, default_value = ServerConfig::DEFAULT_SQLITE_FILE)]
    sqlite_path: PathBuf,

    /// Spreadsheet ID (sheets store)
    #[arg(long)]
    spreadsheet_id: Option<String>,

    /// Worksheet holding the registrations (sheets store)
    #[arg(long, default_value = SheetConfig::DEFAULT_WORKSHEET)]
    worksheet: String,

    /// File containing an OAuth access token (sheets store); falls back to
    /// the CARDLINK_SHEETS_TOKEN environment variable
    #[arg(long)]
    token_file: Option<PathBuf>,
}

fn sheets_token(args: &Args) -> Result<String> {
    if let Some(path) = &args.token_file {
        let token = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read token file {}", path.display()))?;
        return Ok(token.trim().to_string());
    }
    match std::env::var(SheetConfig::ACCESS_TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => bail!(
            "sheets store needs --token-file or {}",
            SheetConfig::ACCESS_TOKEN_ENV
        ),
    }
}

fn open_store(args: &Args) -> Result<Arc<dyn PersistenceGateway>> {
    let store: Arc<dyn PersistenceGateway> = match args.store {
        StoreKind::Memory => {
            warn!("Using in-memory row store; registrations are lost on exit");
            Arc::new(MemoryRowStore::new())
        }
        StoreKind::Sqlite => Arc::new(SqliteRowStore::open_at(&args.sqlite_path)?),
        StoreKind::Sheets => {
            let spreadsheet_id = args
                .spreadsheet_id
                .clone()
                .context("sheets store needs --spreadsheet-id")?;
            let token = sheets_token(args)?;
            Arc::new(SheetsRowStore::new(spreadsheet_id, args.worksheet.clone(), token)?)
        }
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting {} Server", AppConfig::APP_NAME);

    let store = open_store(&args)?;
    info!("Row store: {}", store.backend_name());

    let api = CardlinkApi::builder(store)
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()?;

    let _sweeper = if args.sweep_interval_secs > 0 {
        Some(api.spawn_sweeper(Duration::from_secs(args.sweep_interval_secs)))
    } else {
        None
    };

    let addr = server::start_server(api, &args.host, args.port).await?;

    // Intentional stdout: test harnesses and launch scripts read this line
    println!("CARDLINK_PORT={}", addr.port());

    info!("{} server running on {}", AppConfig::APP_NAME, addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
