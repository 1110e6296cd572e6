//! # DeploymentCluster
//!
//! Per cluster × deployment sub-record written by the external status
//! reconciler. The engine lists and filters these, it never writes them.

use super::Condition;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "DeploymentCluster",
    group = "app.edge-orchestrator.intel.com",
    version = "v1beta1",
    namespaced,
    status = "DeploymentClusterStatus",
    shortname = "dc",
    printcolumn = r#"{"name":"Cluster", "type":"string", "jsonPath":".spec.clusterId"}, {"name":"State", "type":"string", "jsonPath":".status.status.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentClusterSpec {
    /// UID of the owning Deployment
    pub deployment_id: String,
    pub cluster_id: String,
    /// Tenant namespace
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentClusterStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Cluster display name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: ClusterState,
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub last_status_update: Option<String>,
    #[serde(default)]
    pub apps: Vec<AppStatus>,
}

/// Rolled-up state of one cluster (or one app on it)
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterState {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub summary: ClusterSummary,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub total: i32,
    #[serde(default)]
    pub running: i32,
    #[serde(default)]
    pub down: i32,
    #[serde(default)]
    pub unknown: i32,
}

/// Status of one application on one cluster
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    pub name: String,
    /// Bundle id of the app on the cluster
    pub id: String,
    #[serde(default)]
    pub deployment_generation: i64,
    #[serde(default)]
    pub status: ClusterState,
}

impl DeploymentCluster {
    pub fn deployment_id(&self) -> &str {
        &self.spec.deployment_id
    }

    pub fn cluster_id(&self) -> &str {
        &self.spec.cluster_id
    }
}
