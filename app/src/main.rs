// In app/src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use core_types::TradeMode;
use engine::TradingBot;
use gateway::{ExchangeGateway, LiveGateway, PaperGateway};
use ledger::{Ledger, MemoryLedger, PgLedger};
use tokio::sync::watch;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "An OKX spot trading bot.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the trading loop in live or paper mode.
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let settings = app_config::load_settings()?;

    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
        tracing_subscriber::filter::Targets::new()
            .with_target("sqlx::query", tracing::Level::WARN)
            .with_default(parse_log_level(&settings.app.log_level)),
    );
    tracing_subscriber::registry().with(fmt_layer).init();

    let cli = Cli::parse();

    tracing::info!(
        environment = %settings.app.environment,
        "Starting Vantage application"
    );

    match cli.command {
        Commands::Run => run_bot(settings).await?,
    }

    tracing::info!("Vantage application has finished successfully.");

    Ok(())
}

fn parse_log_level(level: &str) -> tracing::Level {
    level.parse().unwrap_or(tracing::Level::INFO)
}

/// The primary logic for the `run` command. Wires the gateway, ledger, and
/// trading loop together and runs until Ctrl-C.
async fn run_bot(settings: app_config::Settings) -> Result<()> {
    let live = LiveGateway::new(&settings.okx);

    let gateway: Arc<dyn ExchangeGateway> = if settings.bot.mode == TradeMode::Live {
        tracing::warn!("LIVE TRADING IS ENABLED. REAL ORDERS WILL BE PLACED.");
        Arc::new(live)
    } else {
        tracing::info!(
            initial_balance = %settings.bot.paper_initial_balance,
            "Paper trading mode: orders are simulated against live market data"
        );
        Arc::new(PaperGateway::new(
            live,
            "USDT",
            settings.bot.paper_initial_balance,
        ))
    };

    let ledger: Arc<dyn Ledger> = match &settings.database {
        Some(db) => {
            let pg = PgLedger::connect(db).await?;
            tracing::info!("Database connection established");
            Arc::new(pg)
        }
        None => {
            tracing::info!("No database configured; recording trades in memory only");
            Arc::new(MemoryLedger::new())
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, stopping after the current tick");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut bot = TradingBot::new(settings.bot, gateway, ledger);
    bot.run(shutdown_rx).await;

    Ok(())
}
