use crate::errors::LookupError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lowest accepted receive window per round, in milliseconds.
const MIN_TIMEOUT_MS: f64 = 0.1;
/// Highest accepted receive window per round, in milliseconds.
const MAX_TIMEOUT_MS: f64 = 10_000.0;
/// Hard cap on extra rounds after the first.
const MAX_RETRIES: u32 = 20;

/// Connection parameters for a lookup session.
///
/// `validate()` runs once at session construction and fails fast on hard
/// errors; out-of-range timeout and retries values are clamped, not rejected,
/// through the `timeout()` and `retries()` accessors.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Shared server password, 4-128 bytes, no newline.
    pub password: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Receive window per round, milliseconds. Clamped to [0.1, 10000].
    ///
    /// The window does not need to exceed the server round-trip time: a
    /// request sent on an earlier round may be answered during a later
    /// round's window, so retries can stand in for a longer timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: f64,
    /// Extra send/receive rounds after the first. Clamped to [0, 20].
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    10020
}
fn default_timeout_ms() -> f64 {
    500.0
}
fn default_retries() -> u32 {
    2
}

impl ClientConfig {
    /// Config with the given password and default server parameters.
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            host: default_host(),
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
        }
    }

    pub fn validate(&self) -> Result<(), LookupError> {
        if self.password.len() < 4 {
            return Err(LookupError::InvalidArgument(
                "password is too short (minimum 4 bytes)".to_string(),
            ));
        }
        // The server reads its password file into a 128-byte buffer.
        if self.password.len() > 128 {
            return Err(LookupError::InvalidArgument(
                "password is too long (maximum 128 bytes)".to_string(),
            ));
        }
        if self.password.contains('\n') {
            return Err(LookupError::InvalidArgument(
                "password contains a newline character".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(LookupError::InvalidArgument(
                "server port out of range".to_string(),
            ));
        }
        if !self.timeout_ms.is_finite() {
            return Err(LookupError::InvalidArgument(
                "timeout is not a finite number".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-round receive window, clamped.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS) / 1000.0)
    }

    /// Extra rounds after the first, clamped.
    pub fn retries(&self) -> u32 {
        self.retries.min(MAX_RETRIES)
    }
}
