// In crates/app-config/src/types.rs

use core_types::{StrategyTier, Symbol, Timeframe, TradeMode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Settings for the OKX API.
    pub okx: OkxSettings,
    /// Optional database connection; without one the bot keeps its ledger
    /// in memory.
    pub database: Option<DatabaseSettings>,
    /// The trading loop's own settings.
    pub bot: BotSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development",
    /// "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct OkxSettings {
    /// API key; may stay empty for paper trading on public endpoints.
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// OKX attaches a passphrase to every signed request.
    #[serde(default)]
    pub passphrase: String,
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,
}

impl OkxSettings {
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.secret_key.is_empty() && !self.passphrase.is_empty()
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseSettings {
    /// The connection URL for the PostgreSQL database.
    pub url: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BotSettings {
    pub mode: TradeMode,
    pub strategy: StrategyTier,
    /// Base percentage of balance risked per trade.
    pub max_risk_percentage: f64,
    /// Instruments to trade, e.g. "BTC/USDT".
    pub symbols: Vec<Symbol>,
    /// Timeframes forecast on each tick; alignment is checked across all
    /// of them.
    pub timeframes: Vec<Timeframe>,
    /// The timeframe trades are decided on.
    #[serde(default = "default_primary_timeframe")]
    pub primary_timeframe: Timeframe,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Virtual quote balance paper mode starts with.
    #[serde(default = "default_paper_initial_balance")]
    pub paper_initial_balance: Decimal,
}

fn default_rest_base_url() -> String {
    "https://www.okx.com".to_string()
}

fn default_primary_timeframe() -> Timeframe {
    Timeframe::H1
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_paper_initial_balance() -> Decimal {
    dec!(10000)
}
