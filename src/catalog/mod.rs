//! # Catalog Collaborator
//!
//! The Catalog service is the source of truth for deployment packages,
//! applications, registries and artifacts. The engine talks to it through
//! [`CatalogClient`]; [`resolver`] turns a package into the ordered list of
//! applications a Deployment record is built from.

mod rest;
pub mod resolver;
mod static_catalog;

pub use resolver::{
    list_api_extensions, list_grafana_artifacts, resolve_deployment_package, set_deployed_flag,
    HelmCredential, DockerCredential, RequiredDeploymentPackage, ResolvedApp, ResolvedPackage,
};
pub use rest::RestCatalogClient;
pub use static_catalog::StaticCatalog;

use crate::error::AdmResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Catalog service contract
#[async_trait]
pub trait CatalogClient: Send + Sync + std::fmt::Debug {
    async fn get_deployment_package(&self, name: &str, version: &str)
        -> AdmResult<DeploymentPackage>;
    async fn update_deployment_package(&self, package: &DeploymentPackage) -> AdmResult<()>;
    async fn get_application(&self, name: &str, version: &str) -> AdmResult<CatalogApplication>;
    /// `show_sensitive` asks for credentials and CA certificates
    async fn get_registry(&self, name: &str, show_sensitive: bool) -> AdmResult<Registry>;
    async fn list_artifacts(&self) -> AdmResult<Vec<Artifact>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentPackage {
    pub name: String,
    pub version: String,
    pub display_name: String,
    pub description: String,
    pub default_profile_name: String,
    pub profiles: Vec<DeploymentProfile>,
    pub application_references: Vec<ApplicationReference>,
    pub application_dependencies: Vec<ApplicationDependency>,
    /// Application name to default namespace
    pub default_namespaces: BTreeMap<String, String>,
    pub forbids_multiple_deployments: bool,
    pub namespaces: Vec<NamespaceTemplate>,
    pub extensions: Vec<ApiExtensionTemplate>,
    pub artifacts: Vec<ArtifactReference>,
    pub is_deployed: bool,
}

/// Deployment profile: application name to application profile name
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentProfile {
    pub name: String,
    pub display_name: String,
    pub application_profiles: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationReference {
    pub name: String,
    pub version: String,
}

/// `name` must be deployed after `requires`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationDependency {
    pub name: String,
    pub requires: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamespaceTemplate {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiExtensionTemplate {
    pub name: String,
    pub version: String,
    pub display_name: String,
    pub description: String,
    pub endpoints: Vec<EndpointTemplate>,
    pub ui_extension: Option<UiExtensionTemplate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointTemplate {
    pub service_name: String,
    pub external_path: String,
    pub internal_path: String,
    pub scheme: String,
    pub auth_type: String,
    pub app_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiExtensionTemplate {
    pub label: String,
    pub service_name: String,
    pub description: String,
    pub file_name: String,
    pub app_name: String,
    pub module_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactReference {
    pub name: String,
    pub purpose: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Artifact {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub mime_type: String,
    /// Base64 content
    pub artifact: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogApplication {
    pub name: String,
    pub version: String,
    pub chart_name: String,
    pub chart_version: String,
    pub helm_registry_name: String,
    pub image_registry_name: String,
    pub profiles: Vec<ApplicationProfile>,
    pub ignored_resources: Vec<ResourceReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationProfile {
    pub name: String,
    /// Helm values YAML
    pub chart_values: String,
    pub parameter_templates: Vec<ParameterTemplate>,
    pub deployment_requirement: Vec<DeploymentRequirement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterTemplate {
    /// Dotted override key
    pub name: String,
    pub display_name: String,
    /// `string`, `number` or `boolean`
    pub r#type: String,
    pub default: String,
    pub mandatory: bool,
    pub secret: bool,
}

/// Sub-package an application profile requires
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentRequirement {
    pub name: String,
    pub version: String,
    pub deployment_profile_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceReference {
    pub name: String,
    pub kind: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Registry {
    pub name: String,
    pub root_url: String,
    pub username: String,
    pub auth_token: String,
    pub cacerts: String,
}
