//! TOTP verification for control requests.
//!
//! Standard authenticator parameters: SHA1, 6 digits, 30-second step, with
//! one step of tolerance for clock drift.

use std::time::{SystemTime, UNIX_EPOCH};

use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::{ControlError, ControlResult};

/// Environment variable holding the base32 TOTP secret.
pub const TOKEN_ENV: &str = "TOKEN";

const TOTP_ALGORITHM: Algorithm = Algorithm::SHA1;
const TOTP_DIGITS: usize = 6;
const TOTP_STEP: u64 = 30;
const TOTP_SKEW: u8 = 1;

/// Result of checking a request token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCheck {
    Valid,
    Invalid,
    /// No secret configured or no token supplied.
    Unavailable,
}

/// Verifies one-time tokens against the configured secret.
pub struct TokenVerifier {
    totp: Option<TOTP>,
}

impl TokenVerifier {
    /// Verifier with no secret; every check is `Unavailable`.
    pub fn disabled() -> Self {
        Self { totp: None }
    }

    /// Build from a base32 secret. Spaces and case are ignored.
    pub fn from_secret(secret: &str) -> ControlResult<Self> {
        let normalized: String = secret
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        if normalized.is_empty() {
            return Ok(Self::disabled());
        }

        let bytes = Secret::Encoded(normalized)
            .to_bytes()
            .map_err(|e| ControlError::InvalidSecret(format!("{e:?}")))?;
        let totp = TOTP::new_unchecked(TOTP_ALGORITHM, TOTP_DIGITS, TOTP_SKEW, TOTP_STEP, bytes);
        Ok(Self { totp: Some(totp) })
    }

    /// Read the secret from [`TOKEN_ENV`].
    pub fn from_env() -> ControlResult<Self> {
        match std::env::var(TOKEN_ENV) {
            Ok(secret) => Self::from_secret(&secret),
            Err(_) => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.totp.is_some()
    }

    /// Check a token against the current time.
    pub fn check(&self, token: Option<&str>) -> TokenCheck {
        self.check_at(token, unix_now())
    }

    /// Check a token against `time` (seconds since the epoch).
    pub fn check_at(&self, token: Option<&str>, time: u64) -> TokenCheck {
        let (Some(totp), Some(token)) = (&self.totp, token.map(str::trim)) else {
            return TokenCheck::Unavailable;
        };
        if token.is_empty() {
            return TokenCheck::Unavailable;
        }
        if token.len() != TOTP_DIGITS || !token.chars().all(|c| c.is_ascii_digit()) {
            return TokenCheck::Invalid;
        }
        if totp.check(token, time) {
            TokenCheck::Valid
        } else {
            TokenCheck::Invalid
        }
    }

    /// Token for `time`, if a secret is configured.
    pub fn generate_at(&self, time: u64) -> Option<String> {
        self.totp.as_ref().map(|totp| totp.generate(time))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
