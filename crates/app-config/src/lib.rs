// In crates/app-config/src/lib.rs

use config::{Config, Environment, File};
use core_types::TradeMode;

pub mod error;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use types::{AppSettings, BotSettings, DatabaseSettings, OkxSettings, Settings};

/// Loads the application settings from various sources.
///
/// This function orchestrates the layered configuration loading:
/// 1. Reads from a default `base.toml` file.
/// 2. Merges settings from an environment-specific file (e.g., `development.toml`).
/// 3. Merges settings from environment variables (`APP` prefix, `__` separator).
pub fn load_settings() -> Result<Settings> {
    // Get the current environment. Default to "development" if not set.
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

    let settings = Config::builder()
        .add_source(File::with_name("config/base"))
        .add_source(File::with_name(&format!("config/{}", environment)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}

impl Settings {
    /// Cross-field checks that serde cannot express. Live execution without
    /// API credentials is fatal here, before the trading loop ever starts.
    pub fn validate(&self) -> Result<()> {
        if matches!(self.bot.mode, TradeMode::Live | TradeMode::Both)
            && !self.okx.has_credentials()
        {
            return Err(Error::Validation(format!(
                "{:?} mode requires OKX api_key, secret_key and passphrase",
                self.bot.mode
            )));
        }
        if self.bot.symbols.is_empty() {
            return Err(Error::Validation("at least one symbol is required".to_string()));
        }
        for symbol in &self.bot.symbols {
            core_types::Symbol::parse(&symbol.0)
                .map_err(|e| Error::Validation(e.to_string()))?;
        }
        if self.bot.max_risk_percentage <= 0.0 || self.bot.max_risk_percentage > 100.0 {
            return Err(Error::Validation(format!(
                "max_risk_percentage must be in (0, 100], got {}",
                self.bot.max_risk_percentage
            )));
        }
        Ok(())
    }
}
