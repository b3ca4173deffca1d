//! Control server configuration.

use serde::{Deserialize, Serialize};

/// Control server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Start pollers at launch instead of waiting for the first request.
    #[serde(default)]
    pub auto_start: bool,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            auto_start: false,
        }
    }
}

impl ControlConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
