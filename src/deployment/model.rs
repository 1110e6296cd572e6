//! # API Model
//!
//! Request and response shapes of the deployment API. Field names are
//! camelCase on the wire.

use crate::query::Selectable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deployment as seen by API callers
///
/// `name`, `deployId`, `status`, `apps`, `createTime`, `defaultProfileName`
/// and `childDeploymentIds` are filled by the engine and ignored on input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiDeployment {
    pub name: String,
    pub display_name: String,
    /// Deployment package name
    pub app_name: String,
    /// Deployment package version
    pub app_version: String,
    pub profile_name: String,
    pub deploy_id: String,
    pub deployment_type: String,
    pub network_name: String,
    pub override_values: Vec<OverrideValues>,
    pub target_clusters: Vec<TargetClusters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_app_target_clusters: Option<TargetClusters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeploymentStatusView>,
    pub apps: Vec<App>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    pub default_profile_name: String,
    pub child_deployment_ids: Vec<String>,
}

/// Override values of one application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverrideValues {
    pub app_name: String,
    pub target_namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Cluster selection of one application (or of every application)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetClusters {
    pub app_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    pub cluster_id: String,
}

/// Projected deployment or cluster state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Running,
    Down,
    InternalError,
    #[default]
    Deploying,
    Updating,
    Terminating,
    Error,
    NoTargetClusters,
    Unknown,
}

impl State {
    /// Project a raw status string written by the reconcilers
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "True" | "Running" => State::Running,
            "False" | "Down" => State::Down,
            "InternalError" => State::InternalError,
            "Deploying" => State::Deploying,
            "Updating" => State::Updating,
            "Terminating" => State::Terminating,
            "Error" => State::Error,
            "NoTargetClusters" => State::NoTargetClusters,
            "Unknown" => State::Unknown,
            _ => State::Deploying,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Running => "RUNNING",
            State::Down => "DOWN",
            State::InternalError => "INTERNAL_ERROR",
            State::Deploying => "DEPLOYING",
            State::Updating => "UPDATING",
            State::Terminating => "TERMINATING",
            State::Error => "ERROR",
            State::NoTargetClusters => "NO_TARGET_CLUSTERS",
            State::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentStatusView {
    pub state: State,
    pub message: String,
    pub summary: SummaryView,
}

/// Cluster counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummaryView {
    pub total: i32,
    pub running: i32,
    pub down: i32,
    pub unknown: i32,
    pub r#type: String,
}

/// One application on one cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct App {
    pub id: String,
    pub name: String,
    pub status: DeploymentStatusView,
}

/// One cluster of a deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub status: DeploymentStatusView,
    pub apps: Vec<App>,
}

/// Cluster known to the tenant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterInfo {
    pub id: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
}

/// A deployment as seen from one cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentInstancesCluster {
    pub deployment_uid: String,
    pub deployment_name: String,
    pub deployment_display_name: String,
    pub status: DeploymentStatusView,
    pub apps: Vec<App>,
}

/// Deployment counts by state bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentsStatus {
    pub total: i32,
    pub running: i32,
    pub down: i32,
    pub deploying: i32,
    pub updating: i32,
    pub terminating: i32,
    pub error: i32,
    pub unknown: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeleteType {
    #[default]
    ParentOnly,
    All,
}

/// Paging and ordering shared by the List operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListRequest {
    pub labels: Vec<String>,
    pub order_by: String,
    pub filter: String,
    pub page_size: i32,
    pub offset: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListDeploymentsResponse {
    pub deployments: Vec<ApiDeployment>,
    pub total_elements: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListDeploymentClustersResponse {
    pub clusters: Vec<Cluster>,
    pub total_elements: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListDeploymentsPerClusterResponse {
    pub deployment_instances_cluster: Vec<DeploymentInstancesCluster>,
    pub total_elements: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListClustersResponse {
    pub clusters: Vec<ClusterInfo>,
    pub total_elements: i32,
}

/// Cluster with its rolled-up status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterDetail {
    pub id: String,
    pub name: String,
    pub status: DeploymentStatusView,
    pub apps: Vec<App>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiExtensionToken {
    pub name: String,
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiExtension {
    pub service_name: String,
    pub description: String,
    pub label: String,
    pub file_name: String,
    pub app_name: String,
    pub module_name: String,
}

impl Selectable for ApiDeployment {
    fn field(&self, name: &str) -> Option<String> {
        match name {
            "name" => Some(self.name.clone()),
            "displayName" => Some(self.display_name.clone()),
            "appName" => Some(self.app_name.clone()),
            "appVersion" => Some(self.app_version.clone()),
            "deployId" => Some(self.deploy_id.clone()),
            "status" => Some(
                self.status
                    .as_ref()
                    .map(|s| s.state)
                    .unwrap_or_default()
                    .as_str()
                    .to_string(),
            ),
            _ => None,
        }
    }
}

impl Selectable for Cluster {
    fn field(&self, name: &str) -> Option<String> {
        match name {
            "name" => Some(self.name.clone()),
            "id" => Some(self.id.clone()),
            "status" => Some(self.status.state.as_str().to_string()),
            _ => None,
        }
    }
}

impl Selectable for ClusterInfo {
    fn field(&self, name: &str) -> Option<String> {
        match name {
            "name" => Some(self.name.clone()),
            "id" => Some(self.id.clone()),
            _ => None,
        }
    }
}

impl Selectable for DeploymentInstancesCluster {
    fn field(&self, name: &str) -> Option<String> {
        match name {
            "deploymentUid" => Some(self.deployment_uid.clone()),
            "deploymentName" => Some(self.deployment_name.clone()),
            "deploymentDisplayName" => Some(self.deployment_display_name.clone()),
            "status" => Some(self.status.state.as_str().to_string()),
            _ => None,
        }
    }
}
