//! # Object Store Gateway
//!
//! Typed CRUD and label-selector List over the records the engine reads and
//! writes. Two implementations:
//!
//! - [`KubeStore`] talks to the Kubernetes API server through `kube::Api`
//! - [`MemoryStore`] keeps everything in process (tests and `--in-memory` runs)
//!
//! Every error is mapped into [`AdmError`](crate::error::AdmError) before it
//! leaves the store.

mod kube_store;
mod memory;

pub use kube_store::KubeStore;
pub use memory::MemoryStore;

use crate::crd::{APIExtension, Cluster, Deployment, DeploymentCluster};
use crate::error::AdmResult;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::rbac::v1::RoleBinding;
use std::collections::BTreeMap;

/// Equality label selector; every pair must match
pub type Selector = BTreeMap<String, String>;

/// Whether `labels` carry every pair of `selector`
pub fn selector_matches(selector: &Selector, labels: Option<&BTreeMap<String, String>>) -> bool {
    selector
        .iter()
        .all(|(k, v)| labels.and_then(|l| l.get(k)) == Some(v))
}

/// Render a selector as `k1=v1,k2=v2`
pub fn selector_string(selector: &Selector) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Object store contract
///
/// An empty namespace on the List operations of DeploymentClusters means
/// every namespace.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    async fn create_deployment(&self, ns: &str, deployment: &Deployment) -> AdmResult<Deployment>;
    async fn get_deployment(&self, ns: &str, name: &str) -> AdmResult<Deployment>;
    async fn list_deployments(&self, ns: &str, selector: &Selector) -> AdmResult<Vec<Deployment>>;
    /// Full replace guarded by `metadata.resourceVersion`
    async fn update_deployment(&self, ns: &str, deployment: &Deployment) -> AdmResult<Deployment>;
    /// JSON merge patch of the status subresource; `null` removes a key
    async fn patch_deployment_status(
        &self,
        ns: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> AdmResult<Deployment>;
    async fn delete_deployment(&self, ns: &str, name: &str) -> AdmResult<()>;

    async fn list_deployment_clusters(
        &self,
        ns: &str,
        selector: &Selector,
    ) -> AdmResult<Vec<DeploymentCluster>>;

    async fn get_cluster(&self, ns: &str, name: &str) -> AdmResult<Cluster>;
    async fn list_clusters(&self, ns: &str, selector: &Selector) -> AdmResult<Vec<Cluster>>;

    async fn create_api_extension(&self, ns: &str, ext: &APIExtension) -> AdmResult<APIExtension>;
    async fn get_api_extension(&self, ns: &str, name: &str) -> AdmResult<APIExtension>;
    async fn list_api_extensions(
        &self,
        ns: &str,
        selector: &Selector,
    ) -> AdmResult<Vec<APIExtension>>;
    async fn delete_api_extension(&self, ns: &str, name: &str) -> AdmResult<()>;

    async fn create_secret(&self, ns: &str, secret: &Secret) -> AdmResult<Secret>;
    async fn get_secret(&self, ns: &str, name: &str) -> AdmResult<Secret>;
    async fn update_secret(&self, ns: &str, secret: &Secret) -> AdmResult<Secret>;
    async fn delete_secret(&self, ns: &str, name: &str) -> AdmResult<()>;

    /// Create the namespace when it does not exist yet
    async fn ensure_namespace(&self, ns: &str) -> AdmResult<()>;
    /// Merge `labels` into the namespace labels
    async fn label_namespace(&self, ns: &str, labels: &BTreeMap<String, String>) -> AdmResult<()>;
    async fn create_role_binding(&self, ns: &str, binding: &RoleBinding) -> AdmResult<RoleBinding>;
}
