//! # Custom Resource Definitions
//!
//! Record kinds persisted by the deployment manager.
//!
//! `Deployment` is the root entity written by the engine. `DeploymentCluster`
//! records are produced by an external reconciler and only read here.
//! `APIExtension` records are written per deployment when the package ships
//! API extensions, and `Cluster` records name the kubeconfig secret of an
//! edge cluster.

mod api_extension;
mod cluster;
mod deployment_cluster;
mod status;

pub use api_extension::*;
pub use cluster::*;
pub use deployment_cluster::*;
pub use status::*;

use crate::constants::{NETWORK_API_VERSION, NETWORK_KIND};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deployment Custom Resource Definition
///
/// One instance of a catalog deployment package rolled out to a cluster set.
///
/// # Example
///
/// ```yaml
/// apiVersion: app.edge-orchestrator.intel.com/v1beta1
/// kind: Deployment
/// metadata:
///   name: deployment-x7k2p
///   namespace: 5f0c7d1e-tenant
/// spec:
///   displayName: wordpress
///   project: app.edge-orchestrator.intel.com
///   deploymentPackageRef:
///     name: wp
///     version: 0.1.0
///     profileName: default
///   deploymentType: auto-scaling
///   applications:
///     - name: wordpress
///       version: 0.1.0
///       namespace: wordpress
///       targets:
///         - hello: world
///           edge-orchestrator.intel.com/project-id: 5f0c7d1e-tenant
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Deployment",
    group = "app.edge-orchestrator.intel.com",
    version = "v1beta1",
    namespaced,
    status = "DeploymentStatus",
    shortname = "dep",
    printcolumn = r#"{"name":"Display Name", "type":"string", "jsonPath":".spec.displayName"}, {"name":"State", "type":"string", "jsonPath":".status.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    /// Human readable name, unique within (tenant, package coordinates)
    pub display_name: String,
    /// Always `app.edge-orchestrator.intel.com`
    pub project: String,
    /// Catalog package this deployment instantiates
    pub deployment_package_ref: DeploymentPackageRef,
    /// One entry per chart of the package
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub deployment_type: DeploymentType,
    /// Children keyed by child deployment name
    #[serde(default)]
    pub child_deployment_list: BTreeMap<String, DependentDeploymentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_ref: Option<NetworkRef>,
}

/// Deployment type: label based cluster selection or explicit cluster ids
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum DeploymentType {
    #[default]
    #[serde(rename = "auto-scaling")]
    AutoScaling,
    #[serde(rename = "targeted")]
    Targeted,
}

impl DeploymentType {
    /// Unknown values coerce to auto-scaling
    pub fn parse(value: &str) -> Self {
        if value == crate::constants::DEPLOYMENT_TYPE_TARGETED {
            DeploymentType::Targeted
        } else {
            DeploymentType::AutoScaling
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentType::AutoScaling => crate::constants::DEPLOYMENT_TYPE_AUTO_SCALING,
            DeploymentType::Targeted => crate::constants::DEPLOYMENT_TYPE_TARGETED,
        }
    }
}

/// Package coordinates plus the namespaces the package declares
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentPackageRef {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub profile_name: String,
    #[serde(default)]
    pub forbids_multiple_deployments: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<Namespace>,
}

impl DeploymentPackageRef {
    /// Package id `name/version/profile`
    pub fn package_id(&self) -> String {
        package_id(&self.name, &self.version, &self.profile_name)
    }
}

/// Package id used as key of dependent package maps
pub fn package_id(name: &str, version: &str, profile: &str) -> String {
    format!("{name}/{version}/{profile}")
}

/// Namespace declared by a package
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Edge of the dependency graph: the package of the related deployment and its name
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DependentDeploymentRef {
    pub deployment_package_ref: DeploymentPackageRef,
    pub deployment_name: String,
}

/// Reference to the network a deployment joins
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRef {
    pub name: String,
    pub kind: String,
    pub api_version: String,
}

impl NetworkRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NETWORK_KIND.to_string(),
            api_version: NETWORK_API_VERSION.to_string(),
        }
    }
}

/// Application embedded in a Deployment, one per chart
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub name: String,
    /// Catalog application version
    pub version: String,
    /// Target namespace on the edge cluster
    pub namespace: String,
    #[serde(default)]
    pub namespace_labels: BTreeMap<String, String>,
    /// Cluster selectors; an entry matches a cluster carrying all its labels
    #[serde(default)]
    pub targets: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    pub profile_secret_name: String,
    #[serde(default)]
    pub value_secret_name: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub redeploy_after_update: bool,
    #[serde(default)]
    pub ignore_resources: Vec<IgnoreResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm_app: Option<HelmApp>,
    /// Required sub-packages keyed by package id
    #[serde(default)]
    pub dependent_deployment_packages: BTreeMap<String, DeploymentPackageRef>,
    #[serde(default)]
    pub enable_service_export: bool,
}

/// Resource the fleet agent should not diff
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreResource {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub namespace: String,
}

/// Helm chart coordinates and registry secrets
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelmApp {
    pub chart: String,
    pub version: String,
    pub repo: String,
    #[serde(default)]
    pub repo_secret_name: String,
    #[serde(default)]
    pub image_registry: String,
    #[serde(default)]
    pub image_registry_secret_name: String,
}

impl Deployment {
    /// Name from metadata, empty when unset
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// UID from metadata, empty when unset
    pub fn uid(&self) -> &str {
        self.metadata.uid.as_deref().unwrap_or_default()
    }

    /// Parent back-edges recorded in status
    pub fn parents(&self) -> BTreeMap<String, DependentDeploymentRef> {
        self.status
            .as_ref()
            .map(|s| s.parent_deployment_list.clone())
            .unwrap_or_default()
    }
}
