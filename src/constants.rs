//! # Constants
//!
//! Default values and fixed names shared across the deployment manager.

/// Default HTTP port for the API surface, metrics and probes
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default server startup timeout in seconds
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default server readiness poll interval in milliseconds
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default catalog service address
pub const DEFAULT_CATALOG_SERVICE_ADDRESS: &str = "http://app-orch-catalog-rest-proxy:8081";

/// Default path of the machine-to-machine token mounted into the pod
pub const DEFAULT_M2M_TOKEN_PATH: &str = "/var/run/secrets/m2m/token";

/// Default service-account token used for credential store login
pub const DEFAULT_VAULT_K8S_TOKEN_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Default credential store endpoint
pub const DEFAULT_SECRET_SERVICE_ENDPOINT: &str =
    "http://vault.orch-platform.svc.cluster.local:8200";

/// Default credential store KV mount
pub const DEFAULT_SECRET_SERVICE_MOUNT: &str = "secret";

/// Default credential store role (service account)
pub const DEFAULT_SECRET_SERVICE_SA: &str = "orch-svc";

/// Default git service path within the KV mount
pub const DEFAULT_SECRET_SERVICE_GIT_SERVICE_PATH: &str = "ma_git_service";

/// Default KV key holding the git username
pub const DEFAULT_GIT_SERVICE_USERNAME_KV_KEY: &str = "username";

/// Default KV key holding the git password
pub const DEFAULT_GIT_SERVICE_PASSWORD_KV_KEY: &str = "password";

/// Default policy service address
pub const DEFAULT_OPA_ADDRESS: &str = "http://localhost:8181";

/// Default policy package queried for authorization decisions
pub const DEFAULT_OPA_PACKAGE: &str = "deploymentv1";

/// Default name of the hot-reload ConfigMap
pub const DEFAULT_CONFIGMAP_NAME: &str = "app-deployment-manager-config";

/// Default namespace when `POD_NAMESPACE` is not set
pub const DEFAULT_POD_NAMESPACE: &str = "orch-app";

/// Field manager used for server-side patches
pub const FIELD_MANAGER: &str = "app-deployment-manager";

/// API group of every record kind owned by the engine
pub const API_GROUP: &str = "app.edge-orchestrator.intel.com";

/// API version of every record kind owned by the engine
pub const API_VERSION: &str = "v1beta1";

/// `apiVersion` written into owner references
pub const API_GROUP_VERSION: &str = "app.edge-orchestrator.intel.com/v1beta1";

/// Kind written into owner references
pub const DEPLOYMENT_KIND: &str = "Deployment";

/// Value of `spec.project` on every Deployment record
pub const DEPLOYMENT_PROJECT: &str = "app.edge-orchestrator.intel.com";

/// Prefix of generated deployment names
pub const DEPLOYMENT_NAME_PREFIX: &str = "deployment-";

/// Length of the random suffix appended to generated names
pub const DEPLOYMENT_NAME_SUFFIX_LEN: usize = 5;

/// Network reference kind
pub const NETWORK_KIND: &str = "Network";

/// Network reference apiVersion
pub const NETWORK_API_VERSION: &str = "network.edge-orchestrator.intel/v1";

/// Well-known git credential secret created in every tenant namespace
pub const GIT_CREDENTIAL_SECRET_NAME: &str = "fleet-gitrepo-cred";

/// Secret type of the git credential secret
pub const BASIC_AUTH_SECRET_TYPE: &str = "kubernetes.io/basic-auth";

/// Fleet namespace receiving the registry-proxy role binding
pub const FLEET_DEFAULT_NAMESPACE: &str = "fleet-default";

/// Replacement written over secret parameter values in masked overrides
pub const MASK: &str = "********";

/// Maximum depth for dependency traversal, flattening and coercion
pub const MAX_DEPTH: usize = 20;

/// Default page size when the request asks for 0
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Maximum accepted page size
pub const MAX_PAGE_SIZE: i32 = 100;

/// Maximum label strings on cluster requests
pub const MAX_LABELS_PER_REQUEST_CLUSTERS: usize = 100;

/// Maximum label strings on deployment requests
pub const MAX_LABELS_PER_REQUEST_DEPLOYMENTS: usize = 20;

/// Maximum number of clusters returned in a single response
pub const MAX_CLUSTERS_RESPONSE: usize = 1000;

/// Maximum number of deployments returned in a single response
pub const MAX_DEPLOYMENTS_RESPONSE: usize = 1000;

/// Artifact purpose marking Grafana dashboards
pub const GRAFANA_ARTIFACT_PURPOSE: &str = "grafana";

/// Request metadata key carrying the tenant id
pub const ACTIVE_PROJECT_ID_HEADER: &str = "activeprojectid";

/// Deployment types
pub const DEPLOYMENT_TYPE_AUTO_SCALING: &str = "auto-scaling";
pub const DEPLOYMENT_TYPE_TARGETED: &str = "targeted";

/// Delete types
pub const DELETE_TYPE_PARENT_ONLY: &str = "PARENT_ONLY";
pub const DELETE_TYPE_ALL: &str = "ALL";

/// Summary type reported with deployment cluster counts
pub const SUMMARY_TYPE_CLUSTER_COUNTS: &str = "clusterCounts";
