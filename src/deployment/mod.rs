//! # Deployment Engine
//!
//! [`DeploymentService`] owns the Deployment lifecycle: request validation,
//! catalog resolution, dependency traversal, secret materialization and the
//! read paths that roll sub-record status up into API views.
//!
//! Create, Update and Delete hold a single process-wide write lock for their
//! whole duration. Reads never take it.
//!
//! Every operation checks authorization first, then resolves the caller's
//! tenant, which is both the store namespace and the label selector value.

pub mod builder;
mod cluster;
mod create;
mod delete;
pub mod dependency;
mod extension;
mod init;
pub mod model;
mod read;
pub mod secrets;
mod status;
pub mod targets;
pub mod templates;
mod update;

pub use model::*;

use crate::authz::Authorizer;
use crate::catalog::CatalogClient;
use crate::config::{AdmConfig, SharedAdmConfig};
use crate::credentials::CredentialStore;
use crate::crd::Deployment;
use crate::error::{AdmError, AdmResult};
use crate::labels::tenant_selector;
use crate::observability::metrics;
use crate::store::ObjectStore;
use crate::tenant::RequestMetadata;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::warn;

/// Deployment lifecycle controller
#[derive(Debug)]
pub struct DeploymentService {
    store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn CatalogClient>,
    authorizer: Arc<dyn Authorizer>,
    credentials: Arc<dyn CredentialStore>,
    config: SharedAdmConfig,
    write_lock: Mutex<()>,
}

impl DeploymentService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn CatalogClient>,
        authorizer: Arc<dyn Authorizer>,
        credentials: Arc<dyn CredentialStore>,
        config: SharedAdmConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            authorizer,
            credentials,
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Snapshot of the current configuration; hot reloads apply to the next request
    async fn config(&self) -> AdmConfig {
        self.config.read().await.clone()
    }

    /// Ask the policy collaborator; a denial is forbidden with `denied` as prefix
    async fn authorize<T: Serialize + ?Sized>(
        &self,
        operation: &str,
        request: &T,
        metadata: &RequestMetadata,
        denied: &str,
    ) -> AdmResult<()> {
        let request = serde_json::to_value(request)?;
        self.authorizer
            .authorize(operation, &request, metadata)
            .await
            .map_err(|e| {
                warn!(operation, error = %e, "{denied}");
                AdmError::Forbidden(format!("{denied}: {}", e.message()))
            })
    }

    /// Tenant deployment with the given UID, `None` when the tenant has none
    async fn find_by_uid(&self, tenant: &str, uid: &str) -> AdmResult<Option<Deployment>> {
        let deployments = self
            .store
            .list_deployments(tenant, &tenant_selector(tenant))
            .await?;
        Ok(deployments.into_iter().find(|d| d.uid() == uid))
    }
}

/// Run one API operation with request metrics
pub(crate) async fn observe<T, F>(operation: &'static str, fut: F) -> AdmResult<T>
where
    F: Future<Output = AdmResult<T>>,
{
    metrics::increment_requests_total(operation);
    let start = Instant::now();
    let result = fut.await;
    metrics::observe_request_duration(operation, start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        metrics::increment_request_errors_total(operation, e.as_str());
        warn!(operation, error = %e, "request failed");
    }
    result
}

fn incomplete_request() -> AdmError {
    AdmError::invalid("incomplete request")
}
