// In crates/engine/src/lib.rs

pub mod bot;

pub use bot::TradingBot;
