//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or
//! malformed. The API key is wrapped in `secrecy::SecretString` so it
//! never shows up in logs.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::WorkerConfig;
use crate::error::{Error, Result};
use secrecy::SecretString;

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub api_key: Option<SecretString>,
    pub bind_addr: SocketAddr,
    pub source_a_path: PathBuf,
    pub source_b_path: PathBuf,
    pub processing_delay: Duration,
    pub poll_interval: Duration,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            api_key: optional_var("API_KEY").map(SecretString::from),
            bind_addr: parsed_var("BIND_ADDR", "127.0.0.1:5000")?,
            source_a_path: optional_var("SOURCE_A_PATH")
                .unwrap_or_else(|| "data/source_a.json".to_string())
                .into(),
            source_b_path: optional_var("SOURCE_B_PATH")
                .unwrap_or_else(|| "data/source_b.csv".to_string())
                .into(),
            processing_delay: Duration::from_millis(parsed_var("PROCESSING_DELAY_MS", "5000")?),
            poll_interval: nonzero_millis("POLL_INTERVAL_MS", "1000")?,
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            poll_interval: self.poll_interval,
            processing_delay: self.processing_delay,
        }
    }
}

fn required_var(name: &str) -> Result<String> {
    optional_var(name)
        .ok_or_else(|| Error::Config(format!("required environment variable {name} is not set")))
}

/// Unset and empty are treated the same.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// A millisecond duration that must be at least 1ms.
fn nonzero_millis(name: &str, default: &str) -> Result<Duration> {
    match parsed_var::<u64>(name, default)? {
        0 => Err(Error::Config(format!("{name} must be greater than 0"))),
        ms => Ok(Duration::from_millis(ms)),
    }
}

fn parsed_var<T>(name: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = optional_var(name).unwrap_or_else(|| default.to_string());
    raw.parse()
        .map_err(|e| Error::Config(format!("invalid {name}={raw:?}: {e}")))
}
