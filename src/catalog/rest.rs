//! # REST Catalog Client
//!
//! [`CatalogClient`] against the catalog REST proxy.

use super::{Artifact, CatalogApplication, CatalogClient, DeploymentPackage, Registry};
use crate::config::AdmConfig;
use crate::error::{AdmError, AdmResult};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

const API_PREFIX: &str = "catalog.orchestrator.apis/v3";

/// Catalog client over HTTP
#[derive(Debug, Clone)]
pub struct RestCatalogClient {
    http_client: ReqwestClient,
    base_url: String,
    /// Machine token file, read on every call when set
    m2m_token_path: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageEnvelope {
    deployment_package: DeploymentPackage,
}

#[derive(Deserialize)]
struct ApplicationEnvelope {
    application: CatalogApplication,
}

#[derive(Deserialize)]
struct RegistryEnvelope {
    registry: Registry,
}

#[derive(Deserialize)]
struct ArtifactsEnvelope {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

impl RestCatalogClient {
    /// Build a client from the engine configuration
    pub fn new(config: &AdmConfig) -> AdmResult<Self> {
        if config.catalog_service_address.is_empty() {
            return Err(AdmError::Unavailable(
                "catalog service address is not set".to_string(),
            ));
        }
        let http_client = ReqwestClient::builder()
            .build()
            .map_err(|e| AdmError::Unavailable(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            base_url: config.catalog_service_address.trim_end_matches('/').to_string(),
            m2m_token_path: config
                .use_m2m_token
                .then(|| config.m2m_token_path.clone()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{API_PREFIX}/{path}", self.base_url)
    }

    async fn authorize(&self, request: RequestBuilder) -> AdmResult<RequestBuilder> {
        let Some(path) = &self.m2m_token_path else {
            return Ok(request);
        };
        let token = tokio::fs::read_to_string(path).await.map_err(|e| {
            AdmError::Unavailable(format!("failed to read machine token {path}: {e}"))
        })?;
        Ok(request.bearer_auth(token.trim()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> AdmResult<T> {
        let url = self.url(path);
        debug!(url = %url, "Catalog request");
        let request = self.authorize(self.http_client.get(&url).query(query)).await?;
        let response = check(request.send().await?, &url).await?;
        Ok(response.json::<T>().await?)
    }
}

async fn check(response: Response, url: &str) -> AdmResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    Err(AdmError::from_http_status(
        status.as_u16(),
        format!("catalog request {url} failed: HTTP {status} - {error_text}"),
    ))
}

#[async_trait]
impl CatalogClient for RestCatalogClient {
    async fn get_deployment_package(
        &self,
        name: &str,
        version: &str,
    ) -> AdmResult<DeploymentPackage> {
        let envelope: PackageEnvelope = self
            .get_json(&format!("deployment_packages/{name}/versions/{version}"), &[])
            .await?;
        Ok(envelope.deployment_package)
    }

    async fn update_deployment_package(&self, package: &DeploymentPackage) -> AdmResult<()> {
        let url = self.url(&format!(
            "deployment_packages/{}/versions/{}",
            package.name, package.version
        ));
        let request = self.authorize(self.http_client.put(&url).json(package)).await?;
        check(request.send().await?, &url).await?;
        Ok(())
    }

    async fn get_application(&self, name: &str, version: &str) -> AdmResult<CatalogApplication> {
        let envelope: ApplicationEnvelope = self
            .get_json(&format!("applications/{name}/versions/{version}"), &[])
            .await?;
        Ok(envelope.application)
    }

    async fn get_registry(&self, name: &str, show_sensitive: bool) -> AdmResult<Registry> {
        let show = if show_sensitive { "true" } else { "false" };
        let envelope: RegistryEnvelope = self
            .get_json(&format!("registries/{name}"), &[("showSensitiveInfo", show)])
            .await?;
        Ok(envelope.registry)
    }

    async fn list_artifacts(&self) -> AdmResult<Vec<Artifact>> {
        let envelope: ArtifactsEnvelope = self.get_json("artifacts", &[]).await?;
        Ok(envelope.artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_address() {
        let config = AdmConfig {
            catalog_service_address: String::new(),
            ..Default::default()
        };
        let err = RestCatalogClient::new(&config).unwrap_err();
        assert_eq!(err.message(), "catalog service address is not set");
    }

    #[test]
    fn test_url_layout() {
        let config = AdmConfig {
            catalog_service_address: "http://catalog:8081/".to_string(),
            use_m2m_token: true,
            ..Default::default()
        };
        let client = RestCatalogClient::new(&config).unwrap();
        assert_eq!(
            client.url("applications/wordpress/versions/0.1.0"),
            "http://catalog:8081/catalog.orchestrator.apis/v3/applications/wordpress/versions/0.1.0"
        );
        assert!(client.m2m_token_path.is_some());
    }

    #[test]
    fn test_package_envelope_decodes_camel_case() {
        let envelope: PackageEnvelope = serde_json::from_value(serde_json::json!({
            "deploymentPackage": {
                "name": "wp",
                "version": "0.1.0",
                "defaultProfileName": "default",
                "forbidsMultipleDeployments": true,
                "applicationReferences": [{"name": "wordpress", "version": "0.1.0"}]
            }
        }))
        .unwrap();
        assert!(envelope.deployment_package.forbids_multiple_deployments);
        assert_eq!(envelope.deployment_package.application_references.len(), 1);
    }
}
