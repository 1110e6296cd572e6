//! # Deployment Status
//!
//! Observed state of a Deployment record and the per-cluster rollup.

use super::DependentDeploymentRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of the Deployment resource
///
/// `state` holds the raw string written by the status reconciler
/// (Running, Down, Deploying, Updating, Terminating, Error, InternalError,
/// NoTargetClusters, Unknown, or a boolean-style True/False).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub message: String,
    /// Cluster counts across every DeploymentCluster of this deployment
    #[serde(default)]
    pub summary: Summary,
    #[serde(default)]
    pub deploy_in_progress: bool,
    #[serde(default)]
    pub last_force_resync: Option<String>,
    /// Last status update time (RFC3339)
    #[serde(default)]
    pub last_status_update: Option<String>,
    #[serde(default)]
    pub reconciled_generation: i64,
    /// Back-edges to every parent that lists this deployment as a child
    #[serde(default)]
    pub parent_deployment_list: BTreeMap<String, DependentDeploymentRef>,
}

/// Cluster counts
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default)]
    pub total: i32,
    #[serde(default)]
    pub running: i32,
    #[serde(default)]
    pub down: i32,
    #[serde(default)]
    pub unknown: i32,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    #[serde(default)]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
