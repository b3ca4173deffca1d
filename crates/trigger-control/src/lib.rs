//! HTTP control surface for the trigger bot.
//!
//! ```text
//! GET /             start monitoring (once), redirect to /ticker
//! GET /start?token  TOTP-checked: leave read-only mode, start monitoring
//! GET /stop?token   TOTP-checked: shut the process down
//! GET /ticker       latest ticks and rules as text tables
//! GET /api/snapshot same data as JSON
//! GET /metrics      Prometheus exposition
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use trigger_control::{run_server, ControlConfig, ControlState};
//!
//! let state = ControlState::new(board, rules, latch, verifier, monitor, shutdown_tx);
//! tokio::spawn(run_server(state, ControlConfig::default()));
//! ```

mod auth;
mod config;
mod error;
mod render;
mod server;
mod state;

pub use auth::{TokenCheck, TokenVerifier, TOKEN_ENV};
pub use config::ControlConfig;
pub use error::{ControlError, ControlResult};
pub use render::{render_rules, render_ticker_page, render_ticks};
pub use server::{create_router, run_server};
pub use state::{ControlSnapshot, ControlState, MonitorSwitch};
