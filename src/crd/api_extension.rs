//! # APIExtension
//!
//! API and UI extensions a deployment package exposes through the
//! orchestrator gateway. One record per (deployment, extension).

use super::Condition;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "APIExtension",
    group = "app.edge-orchestrator.intel.com",
    version = "v1beta1",
    namespaced,
    status = "APIExtensionStatus",
    shortname = "apiext",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct APIExtensionSpec {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub project: String,
    pub api_group: APIGroup,
    #[serde(default)]
    pub proxy_endpoints: Vec<ProxyEndpoint>,
    #[serde(default)]
    pub ui_extensions: Vec<UIExtension>,
    /// Labels the agent cluster must carry
    #[serde(default)]
    pub agent_cluster_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct APIGroup {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEndpoint {
    pub service_name: String,
    pub path: String,
    pub backend: String,
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub auth_type: String,
    #[serde(default)]
    pub app_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UIExtension {
    pub service_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub module_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct APIExtensionStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub token_secret_ref: TokenSecretRef,
}

/// Token minted for the extension by the gateway
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenSecretRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}
