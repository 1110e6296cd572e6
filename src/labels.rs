//! # Well-known Labels
//!
//! Label keys and values the engine reads and writes on persisted records.

use std::collections::BTreeMap;

/// Tenant partition label on every record
pub const TENANT: &str = "app.edge-orchestrator.intel.com/project-id";

/// Tenant key added to every target-cluster map
pub const TARGET_TENANT: &str = "edge-orchestrator.intel.com/project-id";

/// Backlink from sub-records, secrets and API extensions to a Deployment UID
pub const DEPLOYMENT_ID: &str = "app.edge-orchestrator.intel.com/deployment-id";

/// Cluster binding on DeploymentCluster records and target maps
pub const CLUSTER_NAME: &str = "edge-orchestrator.intel.com/clustername";

/// Namespace marker installed for the registry proxy
pub const FLEET_RS_SECRET: &str = "app.edge-orchestrator.intel.com/fleet-rs-secret";

/// Bundle labels written by the fleet agent
pub const APP_NAME: &str = "app.edge-orchestrator.intel.com/app-name";
pub const BUNDLE_NAME: &str = "app.edge-orchestrator.intel.com/bundle-name";
pub const BUNDLE_TYPE: &str = "app.edge-orchestrator.intel.com/bundle-type";

const K8S_NAME: &str = "app.kubernetes.io/name";
const K8S_INSTANCE: &str = "app.kubernetes.io/instance";
const K8S_PART_OF: &str = "app.kubernetes.io/part-of";
const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
const K8S_CREATED_BY: &str = "app.kubernetes.io/created-by";

/// Labels written on every new Deployment record
pub fn deployment_labels(name: &str, tenant: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (K8S_NAME.to_string(), "deployment".to_string()),
        (K8S_INSTANCE.to_string(), name.to_string()),
        (K8S_PART_OF.to_string(), "app-deployment-manager".to_string()),
        (K8S_MANAGED_BY.to_string(), "kustomize".to_string()),
        (K8S_CREATED_BY.to_string(), "app-deployment-manager".to_string()),
        (TENANT.to_string(), tenant.to_string()),
    ])
}

/// Selector matching every record of a tenant
pub fn tenant_selector(tenant: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(TENANT.to_string(), tenant.to_string())])
}
