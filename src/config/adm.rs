//! # Engine Configuration
//!
//! Collaborator addresses and feature switches of the deployment engine.

use super::value_or_default;
use crate::constants::*;
use std::collections::BTreeMap;

/// Deployment engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmConfig {
    /// Catalog service base URL
    pub catalog_service_address: String,
    /// Attach a machine token to outgoing catalog calls
    pub use_m2m_token: bool,
    pub m2m_token_path: String,
    /// Enables APIExtension records and the extension read operations
    pub api_ext_enabled: bool,
    /// Enables git credential bootstrap from the credential store
    pub secret_service_enabled: bool,
    pub secret_service_endpoint: String,
    pub secret_service_mount: String,
    pub secret_service_sa: String,
    pub vault_k8s_token_path: String,
    pub git_service_path: String,
    pub git_username_kv_key: String,
    pub git_password_kv_key: String,
    /// Registry proxy URL; applications using it get the proxy secret
    pub rs_proxy_repo: String,
    pub rs_proxy_repo_secret: String,
    pub rs_proxy_remote_ns: String,
    /// Baked into every resolved application
    pub redeploy_after_update: bool,
    pub opa_enabled: bool,
    pub opa_address: String,
    pub opa_package: String,
    /// ConfigMap watched for hot reload
    pub configmap_name: String,
    pub pod_namespace: String,
}

impl Default for AdmConfig {
    fn default() -> Self {
        Self {
            catalog_service_address: DEFAULT_CATALOG_SERVICE_ADDRESS.to_string(),
            use_m2m_token: false,
            m2m_token_path: DEFAULT_M2M_TOKEN_PATH.to_string(),
            api_ext_enabled: false,
            secret_service_enabled: false,
            secret_service_endpoint: DEFAULT_SECRET_SERVICE_ENDPOINT.to_string(),
            secret_service_mount: DEFAULT_SECRET_SERVICE_MOUNT.to_string(),
            secret_service_sa: DEFAULT_SECRET_SERVICE_SA.to_string(),
            vault_k8s_token_path: DEFAULT_VAULT_K8S_TOKEN_PATH.to_string(),
            git_service_path: DEFAULT_SECRET_SERVICE_GIT_SERVICE_PATH.to_string(),
            git_username_kv_key: DEFAULT_GIT_SERVICE_USERNAME_KV_KEY.to_string(),
            git_password_kv_key: DEFAULT_GIT_SERVICE_PASSWORD_KV_KEY.to_string(),
            rs_proxy_repo: String::new(),
            rs_proxy_repo_secret: String::new(),
            rs_proxy_remote_ns: String::new(),
            redeploy_after_update: false,
            opa_enabled: false,
            opa_address: DEFAULT_OPA_ADDRESS.to_string(),
            opa_package: DEFAULT_OPA_PACKAGE.to_string(),
            configmap_name: DEFAULT_CONFIGMAP_NAME.to_string(),
            pod_namespace: DEFAULT_POD_NAMESPACE.to_string(),
        }
    }
}

impl AdmConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::load(&|k: &str| std::env::var(k).ok(), &Self::default())
    }

    /// Re-apply ConfigMap data over the current values
    pub fn apply(&self, data: &BTreeMap<String, String>) -> Self {
        Self::load(&|k: &str| data.get(k).cloned(), self)
    }

    /// Whether applications pulling from `repo` go through the registry proxy
    pub fn is_rs_proxy_repo(&self, repo: &str) -> bool {
        !self.rs_proxy_repo.is_empty() && repo == self.rs_proxy_repo
    }

    fn load<F>(lookup: &F, base: &AdmConfig) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let s = |key: &str, current: &String| value_or_default(lookup, key, current.clone());
        Self {
            catalog_service_address: s("CATALOG_SERVICE_ADDRESS", &base.catalog_service_address),
            use_m2m_token: value_or_default(lookup, "USE_M2M_TOKEN", base.use_m2m_token),
            m2m_token_path: s("M2M_TOKEN_PATH", &base.m2m_token_path),
            api_ext_enabled: value_or_default(lookup, "API_EXT_ENABLED", base.api_ext_enabled),
            secret_service_enabled: value_or_default(
                lookup,
                "SECRET_SERVICE_ENABLED",
                base.secret_service_enabled,
            ),
            secret_service_endpoint: s("SECRET_SERVICE_ENDPOINT", &base.secret_service_endpoint),
            secret_service_mount: s("SECRET_SERVICE_MOUNT", &base.secret_service_mount),
            secret_service_sa: s("SECRET_SERVICE_SA", &base.secret_service_sa),
            vault_k8s_token_path: s("VAULT_K8S_TOKEN_PATH", &base.vault_k8s_token_path),
            git_service_path: s("SECRET_SERVICE_GIT_SERVICE_PATH", &base.git_service_path),
            git_username_kv_key: s("GIT_SERVICE_USERNAME_KV_KEY", &base.git_username_kv_key),
            git_password_kv_key: s("GIT_SERVICE_PASSWORD_KV_KEY", &base.git_password_kv_key),
            rs_proxy_repo: s("RS_PROXY_REPO", &base.rs_proxy_repo),
            rs_proxy_repo_secret: s("RS_PROXY_REPO_SECRET", &base.rs_proxy_repo_secret),
            rs_proxy_remote_ns: s("RS_PROXY_REMOTE_NS", &base.rs_proxy_remote_ns),
            redeploy_after_update: value_or_default(
                lookup,
                "REDEPLOY_AFTER_UPDATE",
                base.redeploy_after_update,
            ),
            opa_enabled: value_or_default(lookup, "OPA_ENABLED", base.opa_enabled),
            opa_address: s("OPA_ADDRESS", &base.opa_address),
            opa_package: s("OPA_PACKAGE", &base.opa_package),
            configmap_name: s("CONFIGMAP_NAME", &base.configmap_name),
            pod_namespace: s("POD_NAMESPACE", &base.pod_namespace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_disable_optional_features() {
        let config = AdmConfig::default();
        assert!(!config.api_ext_enabled);
        assert!(!config.secret_service_enabled);
        assert!(!config.is_rs_proxy_repo(""));
    }

    #[test]
    fn test_apply_overrides_only_present_keys() {
        let base = AdmConfig::default();
        let data = BTreeMap::from([
            ("API_EXT_ENABLED".to_string(), "true".to_string()),
            ("RS_PROXY_REPO".to_string(), "oci://rs-proxy:8081".to_string()),
            ("REDEPLOY_AFTER_UPDATE".to_string(), "not-a-bool".to_string()),
        ]);
        let updated = base.apply(&data);
        assert!(updated.api_ext_enabled);
        assert!(updated.is_rs_proxy_repo("oci://rs-proxy:8081"));
        assert!(!updated.redeploy_after_update);
        assert_eq!(updated.catalog_service_address, base.catalog_service_address);
    }
}
