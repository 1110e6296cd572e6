//! # Credential Store
//!
//! Git credentials for the fleet agent live in a Vault KV v2 mount. The
//! engine logs in with its Kubernetes service-account token, reads the git
//! service entry and revokes its token again.

use crate::config::AdmConfig;
use crate::error::{AdmError, AdmResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Username and password of the git service
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct GitCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Credential store contract
#[async_trait]
pub trait CredentialStore: Send + Sync + std::fmt::Debug {
    async fn git_credentials(&self) -> AdmResult<GitCredentials>;
}

/// Vault with Kubernetes auth
#[derive(Debug, Clone)]
pub struct VaultCredentialStore {
    http_client: reqwest::Client,
    endpoint: String,
    role: String,
    mount: String,
    token_path: String,
    git_service_path: String,
    username_key: String,
    password_key: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: Option<LoginAuth>,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
}

#[derive(Deserialize)]
struct KvResponse {
    data: KvData,
}

#[derive(Deserialize)]
struct KvData {
    #[serde(default)]
    data: BTreeMap<String, serde_json::Value>,
}

impl VaultCredentialStore {
    pub fn new(config: &AdmConfig) -> AdmResult<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| AdmError::Unavailable(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            endpoint: config.secret_service_endpoint.trim_end_matches('/').to_string(),
            role: config.secret_service_sa.clone(),
            mount: config.secret_service_mount.clone(),
            token_path: config.vault_k8s_token_path.clone(),
            git_service_path: config.git_service_path.clone(),
            username_key: config.git_username_kv_key.clone(),
            password_key: config.git_password_kv_key.clone(),
        })
    }

    async fn login(&self) -> AdmResult<Zeroizing<String>> {
        let jwt = Zeroizing::new(
            tokio::fs::read_to_string(&self.token_path)
                .await
                .map_err(|e| {
                    AdmError::Unavailable(format!(
                        "failed to read service account token {}: {e}",
                        self.token_path
                    ))
                })?
                .trim()
                .to_string(),
        );
        let url = format!("{}/v1/auth/kubernetes/login", self.endpoint);
        let body = serde_json::json!({ "role": self.role, "jwt": jwt.as_str() });
        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?;
        let login: LoginResponse = response.json().await.map_err(unavailable)?;
        let auth = login.auth.ok_or_else(|| {
            AdmError::Unavailable("kubernetes authorization failed for Vault service".to_string())
        })?;
        Ok(Zeroizing::new(auth.client_token))
    }

    async fn logout(&self, token: &str) {
        let url = format!("{}/v1/auth/token/revoke-self", self.endpoint);
        if let Err(e) = self
            .http_client
            .post(&url)
            .header("X-Vault-Token", token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
        {
            warn!("failed to logout from vault: {}", e);
        }
    }

    async fn read_kv(&self, token: &str) -> AdmResult<BTreeMap<String, serde_json::Value>> {
        let url = format!(
            "{}/v1/{}/data/{}",
            self.endpoint, self.mount, self.git_service_path
        );
        let response = self
            .http_client
            .get(&url)
            .header("X-Vault-Token", token)
            .send()
            .await
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(AdmError::Unavailable(format!(
                "failed to read {}: HTTP {}",
                self.git_service_path,
                response.status()
            )));
        }
        let kv: KvResponse = response.json().await.map_err(unavailable)?;
        Ok(kv.data.data)
    }

    fn string_value(
        &self,
        data: &BTreeMap<String, serde_json::Value>,
        key: &str,
    ) -> AdmResult<String> {
        match data.get(key) {
            Some(serde_json::Value::String(v)) => Ok(v.clone()),
            Some(_) => Err(AdmError::invalid(format!(
                "value for key {key} in path {} is not string",
                self.git_service_path
            ))),
            None => Err(AdmError::not_found(format!(
                "could not found value for key {key} in path {}",
                self.git_service_path
            ))),
        }
    }
}

fn unavailable(err: reqwest::Error) -> AdmError {
    AdmError::Unavailable(format!("credential store: {err}"))
}

#[async_trait]
impl CredentialStore for VaultCredentialStore {
    async fn git_credentials(&self) -> AdmResult<GitCredentials> {
        let token = self.login().await?;
        debug!("Logged in to credential store");
        let result = self.read_kv(&token).await.and_then(|mut data| {
            let creds = GitCredentials {
                username: self.string_value(&data, &self.username_key)?,
                password: self.string_value(&data, &self.password_key)?,
            };
            for value in data.values_mut() {
                if let serde_json::Value::String(s) = value {
                    s.zeroize();
                }
            }
            Ok(creds)
        });
        self.logout(&token).await;
        result
    }
}

/// Fixed credentials, for tests and development runs
#[derive(Debug, Clone)]
pub struct StaticCredentialStore {
    credentials: GitCredentials,
}

impl StaticCredentialStore {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: GitCredentials {
                username: username.into(),
                password: password.into(),
            },
        }
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn git_credentials(&self) -> AdmResult<GitCredentials> {
        Ok(self.credentials.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_value_lookup() {
        let store = VaultCredentialStore::new(&AdmConfig::default()).unwrap();
        let data = BTreeMap::from([
            ("username".to_string(), serde_json::json!("git")),
            ("password".to_string(), serde_json::json!(42)),
        ]);
        assert_eq!(store.string_value(&data, "username").unwrap(), "git");
        assert_eq!(store.string_value(&data, "password").unwrap_err().as_str(), "invalid");
        assert!(store.string_value(&data, "missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = GitCredentials {
            username: "git".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn test_static_store() {
        let store = StaticCredentialStore::new("u", "p");
        let creds = store.git_credentials().await.unwrap();
        assert_eq!(creds.username, "u");
        assert_eq!(creds.password, "p");
    }
}
