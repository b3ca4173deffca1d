//! Control surface error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Invalid TOTP secret: {0}")]
    InvalidSecret(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ControlResult<T> = Result<T, ControlError>;
