// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Process configuration, loaded once at startup from environment
//! variables (§6.1, §7 "fail fast at adapter construction").

use thiserror::Error;

/// Immutable configuration for a `choreo` process. Constructed once in
/// `main` and shared behind an `Arc` by every long-lived adapter.
#[derive(Debug, Clone)]
pub struct Config {
    /// `memory://` for the in-process store, otherwise a `redis://` URL.
    pub document_store_url: String,
    pub agent_runtime_url: String,
    pub agent_runtime_token: Option<String>,
    pub listen_addr: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let document_store_url = std::env::var("DOCUMENT_STORE_URL").unwrap_or_else(|_| "memory://".to_string());
        let agent_runtime_url =
            std::env::var("AGENT_RUNTIME_URL").map_err(|_| ConfigError::Missing("AGENT_RUNTIME_URL"))?;
        let agent_runtime_token = std::env::var("AGENT_RUNTIME_TOKEN").ok();
        let listen_addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let request_timeout_ms = match std::env::var("REQUEST_TIMEOUT_MS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "REQUEST_TIMEOUT_MS",
                value: raw,
            })?,
            Err(_) => 30_000,
        };

        Ok(Self {
            document_store_url,
            agent_runtime_url,
            agent_runtime_token,
            listen_addr,
            request_timeout_ms,
        })
    }
}

/// Configures `tracing-subscriber` from `RUST_LOG`/`LOG_FORMAT` (§7
/// "Logging"). `LOG_FORMAT=json` emits structured JSON lines suitable for
/// ingestion; anything else falls back to the human-readable formatter.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_format = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    if json_format {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}
