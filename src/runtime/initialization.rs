//! # Initialization
//!
//! Startup order: rustls provider, tracing subscriber, metrics, HTTP
//! server, then the Kubernetes client and the deployment service. The
//! server is up before the client so liveness probes pass while the
//! cluster connection is established.

use crate::authz::{AllowAll, Authorizer, OpaAuthorizer};
use crate::catalog::{CatalogClient, RestCatalogClient, StaticCatalog};
use crate::config::{create_shared_config, start_configmap_watch, ServerConfig};
use crate::credentials::{CredentialStore, StaticCredentialStore, VaultCredentialStore};
use crate::deployment::DeploymentService;
use crate::observability;
use crate::server::{start_server, ServerState};
use crate::store::{KubeStore, MemoryStore, ObjectStore};
use anyhow::{Context, Result};
use kube::Client;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Where the deployment records live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Custom resources in the cluster the process runs against
    #[default]
    Kubernetes,
    /// Process memory with an empty catalog, for local runs
    InMemory,
}

/// Startup options taken from the command line
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub backend: Backend,
    /// Overrides `HTTP_PORT`
    pub port: Option<u16>,
}

/// Everything `main` keeps after startup
#[derive(Debug)]
pub struct InitializationResult {
    pub server_state: Arc<ServerState>,
    pub server_handle: JoinHandle<()>,
    pub service: Arc<DeploymentService>,
}

/// Bring the process up
pub async fn initialize(options: RuntimeOptions) -> Result<InitializationResult> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "app_deployment_manager=info".into()),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?options.backend,
        "Starting application deployment manager"
    );

    observability::metrics::register_metrics()?;

    let (adm_config, server_config) = create_shared_config();
    let server_settings = server_config.read().await.clone();
    let port = options.port.unwrap_or(server_settings.http_port);

    let server_state = Arc::new(ServerState::default());
    let state = Arc::clone(&server_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, state).await {
            error!("HTTP server error: {:#}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_settings).await?;

    let engine_config = adm_config.read().await.clone();
    let authorizer: Arc<dyn Authorizer> = if engine_config.opa_enabled {
        Arc::new(OpaAuthorizer::new(&engine_config)?)
    } else {
        warn!("Policy checks disabled, every request is allowed");
        Arc::new(AllowAll)
    };

    let (store, catalog, credentials): (
        Arc<dyn ObjectStore>,
        Arc<dyn CatalogClient>,
        Arc<dyn CredentialStore>,
    ) = match options.backend {
        Backend::Kubernetes => {
            let client = Client::try_default()
                .await
                .context("Failed to create Kubernetes client")?;
            start_configmap_watch(
                client.clone(),
                engine_config.pod_namespace.clone(),
                engine_config.configmap_name.clone(),
                Arc::clone(&adm_config),
                Arc::clone(&server_config),
            );
            (
                Arc::new(KubeStore::new(client)),
                Arc::new(RestCatalogClient::new(&engine_config)?),
                Arc::new(VaultCredentialStore::new(&engine_config)?),
            )
        }
        Backend::InMemory => (
            Arc::new(MemoryStore::new()),
            Arc::new(StaticCatalog::new()),
            Arc::new(StaticCredentialStore::new("", "")),
        ),
    };

    let service = Arc::new(DeploymentService::new(
        store,
        catalog,
        authorizer,
        credentials,
        adm_config,
    ));
    server_state.install_service(Arc::clone(&service));
    info!(port, "Deployment API ready");

    Ok(InitializationResult {
        server_state,
        server_handle,
        service,
    })
}

/// Poll until the server has bound its listener
async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &JoinHandle<()>,
    config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> ServerConfig {
        ServerConfig {
            http_port: 0,
            startup_timeout_secs: 1,
            poll_interval_ms: 5,
        }
    }

    #[tokio::test]
    async fn test_wait_returns_once_ready() {
        let state = ServerState::default();
        state.is_ready.store(true, Ordering::Relaxed);
        let handle = tokio::spawn(std::future::pending::<()>());
        wait_for_server_ready(&state, &handle, &fast()).await.unwrap();
        handle.abort();
    }

    #[tokio::test]
    async fn test_wait_fails_when_server_task_exits() {
        let state = ServerState::default();
        let handle = tokio::spawn(async {});
        tokio::time::sleep(Duration::from_millis(20)).await;
        let err = wait_for_server_ready(&state, &handle, &fast())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
