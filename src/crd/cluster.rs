//! # Cluster
//!
//! Edge cluster known to the tenant.

use super::Condition;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Cluster",
    group = "app.edge-orchestrator.intel.com",
    version = "v1beta1",
    namespaced,
    status = "ClusterStatus",
    printcolumn = r#"{"name":"Display Name", "type":"string", "jsonPath":".spec.displayName"}, {"name":"State", "type":"string", "jsonPath":".status.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    /// Secret in the tenant namespace holding the kubeconfig under `value`
    #[serde(default)]
    pub kube_config_secret_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub message: String,
}
