//! # HTTP Server
//!
//! REST surface of the deployment API plus liveness, readiness and
//! Prometheus endpoints.
//!
//! The server is bound before the deployment service exists; API routes
//! answer 503 until [`ServerState::install_service`] has been called.

mod error;
mod handlers;

pub use error::ProblemDetails;
pub use handlers::{list_request, request_metadata};

use crate::deployment::DeploymentService;
use crate::observability::metrics;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Path prefix of every deployment API route
pub const API_PREFIX: &str = "/deployment.orchestrator.apis/v1";

/// Readiness flag and the service the API routes call
#[derive(Debug, Default)]
pub struct ServerState {
    /// Set once the listener is bound
    pub is_ready: Arc<AtomicBool>,
    service: OnceLock<Arc<DeploymentService>>,
}

impl ServerState {
    /// State with a service already installed
    pub fn with_service(service: Arc<DeploymentService>) -> Self {
        let state = Self::default();
        state.install_service(service);
        state
    }

    /// Install the deployment service; later calls are ignored
    pub fn install_service(&self, service: Arc<DeploymentService>) {
        if self.service.set(service).is_err() {
            warn!("Deployment service already installed");
        }
    }

    pub fn service(&self) -> Option<&Arc<DeploymentService>> {
        self.service.get()
    }

    fn ready(&self) -> bool {
        self.is_ready.load(Ordering::Relaxed) && self.service.get().is_some()
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<Arc<ServerState>>) -> StatusCode {
    if state.ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics_text() -> impl IntoResponse {
    match metrics::gather_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => ProblemDetails::internal_error(e.to_string()).into_response(),
    }
}

fn api_routes() -> Router<Arc<ServerState>> {
    Router::new()
        .route(
            "/deployments",
            get(handlers::list_deployments).post(handlers::create_deployment),
        )
        .route(
            "/deployments/{id}",
            get(handlers::get_deployment)
                .put(handlers::update_deployment)
                .delete(handlers::delete_deployment),
        )
        .route(
            "/deployments/{id}/clusters",
            get(handlers::list_deployment_clusters),
        )
        .route(
            "/deployments/clusters/{cluster_id}",
            get(handlers::list_deployments_per_cluster),
        )
        .route(
            "/summary/deployments_status",
            get(handlers::get_deployments_status),
        )
        .route("/clusters", get(handlers::list_clusters))
        .route("/clusters/{cluster_id}", get(handlers::get_cluster))
        .route(
            "/clusters/{cluster_id}/kubeconfig",
            get(handlers::get_kube_config),
        )
        .route("/apiextensions/{name}", get(handlers::get_api_extension))
        .route("/ui_extensions", get(handlers::list_ui_extensions))
        .route("/appnamespace/{app_id}", get(handlers::get_app_namespace))
}

/// Router with the API, probes and metrics
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_text))
        .nest(API_PREFIX, api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind `port` and serve until the listener fails
///
/// Marks the state ready as soon as the listener is bound.
pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {addr}"))?;
    state.is_ready.store(true, Ordering::Relaxed);
    info!(%addr, "HTTP server listening");
    axum::serve(listener, create_router(state))
        .await
        .context("HTTP server stopped")
}
