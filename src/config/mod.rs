//! # Configuration
//!
//! Engine and server configuration loaded from environment variables
//! (populated from a ConfigMap through `envFrom`).
//!
//! All configuration has defaults and can be overridden via environment
//! variables. The ConfigMap is watched and re-applied on change.

mod adm;
mod server;
mod watch;

pub use adm::AdmConfig;
pub use server::ServerConfig;
pub use watch::start_configmap_watch;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Engine configuration, updated when the ConfigMap changes
pub type SharedAdmConfig = Arc<RwLock<AdmConfig>>;

/// Server configuration, updated when the ConfigMap changes
pub type SharedServerConfig = Arc<RwLock<ServerConfig>>;

/// Load configuration from environment variables with defaults
pub fn load_config() -> (AdmConfig, ServerConfig) {
    (AdmConfig::from_env(), ServerConfig::from_env())
}

/// Create shared configuration instances
pub fn create_shared_config() -> (SharedAdmConfig, SharedServerConfig) {
    let (adm_config, server_config) = load_config();
    (
        Arc::new(RwLock::new(adm_config)),
        Arc::new(RwLock::new(server_config)),
    )
}

/// Parse the value returned by `lookup` for `key`, or fall back to `default`
pub(crate) fn value_or_default<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    value_or_default(&|k: &str| std::env::var(k).ok(), key, default)
}
