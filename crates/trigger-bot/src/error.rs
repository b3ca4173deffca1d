//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] trigger_core::CoreError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] trigger_exchange::ExchangeError),

    #[error("Rules error: {0}")]
    Rules(#[from] trigger_rules::RulesError),

    #[error("Feed error: {0}")]
    Feed(#[from] trigger_feed::FeedError),

    #[error("Control error: {0}")]
    Control(#[from] trigger_control::ControlError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] trigger_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
