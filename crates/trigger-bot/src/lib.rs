//! Price-trigger trading bot.
//!
//! Main application that orchestrates all components:
//! - Per-market pollers behind a shared rate limiter
//! - Rule evaluation and order execution behind the read-only gate
//! - The HTTP control surface

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
