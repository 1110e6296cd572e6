//! # Server Configuration
//!
//! HTTP server settings loaded from environment variables.

use super::{env_var_or_default, value_or_default};
use crate::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
};
use std::collections::BTreeMap;

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port for the API surface, metrics and health probes
    pub http_port: u16,
    /// How long to wait for the server to be ready before giving up (seconds)
    pub startup_timeout_secs: u64,
    /// How often to check if the server is ready during startup (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            http_port: env_var_or_default("HTTP_PORT", DEFAULT_HTTP_PORT),
            startup_timeout_secs: env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            poll_interval_ms: env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
        }
    }

    /// Re-apply ConfigMap data over the current values
    pub fn apply(&self, data: &BTreeMap<String, String>) -> Self {
        let lookup = |k: &str| data.get(k).cloned();
        Self {
            http_port: value_or_default(&lookup, "HTTP_PORT", self.http_port),
            startup_timeout_secs: value_or_default(
                &lookup,
                "SERVER_STARTUP_TIMEOUT_SECS",
                self.startup_timeout_secs,
            ),
            poll_interval_ms: value_or_default(
                &lookup,
                "SERVER_POLL_INTERVAL_MS",
                self.poll_interval_ms,
            ),
        }
    }
}
