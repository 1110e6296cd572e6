//! # Authorization
//!
//! Each operation asks the policy collaborator whether `(request, metadata)`
//! is allowed. Anything but an explicit `true` is forbidden.

use crate::config::AdmConfig;
use crate::error::{AdmError, AdmResult};
use crate::tenant::RequestMetadata;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// Policy decision contract
#[async_trait]
pub trait Authorizer: Send + Sync + std::fmt::Debug {
    /// `operation` is the RPC name, e.g. `CreateDeployment`
    async fn authorize(
        &self,
        operation: &str,
        request: &serde_json::Value,
        metadata: &RequestMetadata,
    ) -> AdmResult<()>;
}

/// Policy evaluation disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(
        &self,
        _operation: &str,
        _request: &serde_json::Value,
        _metadata: &RequestMetadata,
    ) -> AdmResult<()> {
        Ok(())
    }
}

/// Open Policy Agent over its data API
#[derive(Debug, Clone)]
pub struct OpaAuthorizer {
    http_client: reqwest::Client,
    address: String,
    package: String,
}

#[derive(Deserialize)]
struct OpaResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
}

impl OpaAuthorizer {
    pub fn new(config: &AdmConfig) -> AdmResult<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| AdmError::Unavailable(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            address: config.opa_address.trim_end_matches('/').to_string(),
            package: config.opa_package.clone(),
        })
    }

    fn rule_url(&self, operation: &str) -> String {
        format!(
            "{}/v1/data/{}/{}Request?pretty=true&metrics=true",
            self.address, self.package, operation
        )
    }
}

#[async_trait]
impl Authorizer for OpaAuthorizer {
    async fn authorize(
        &self,
        operation: &str,
        request: &serde_json::Value,
        metadata: &RequestMetadata,
    ) -> AdmResult<()> {
        let body = serde_json::json!({
            "input": {
                "request": request,
                "metadata": metadata,
            }
        });
        let url = self.rule_url(operation);
        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(operation = operation, error = %e, "Policy service unreachable");
                AdmError::Forbidden(format!("access denied (policy service unreachable): {e}"))
            })?;
        if !response.status().is_success() {
            return Err(AdmError::Forbidden(format!(
                "access denied (policy service returned {})",
                response.status()
            )));
        }
        let decision: OpaResponse = response
            .json()
            .await
            .map_err(|e| AdmError::Forbidden(format!("access denied (bad policy answer): {e}")))?;
        debug!(operation = operation, result = ?decision.result, "Policy decision");
        match decision.result {
            Some(serde_json::Value::Bool(true)) => Ok(()),
            _ => Err(AdmError::Forbidden(format!("access denied for {operation}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allow_all() {
        AllowAll
            .authorize("GetDeployment", &serde_json::Value::Null, &RequestMetadata::new())
            .await
            .unwrap();
    }

    #[test]
    fn test_rule_url() {
        let config = AdmConfig {
            opa_address: "http://opa:8181/".to_string(),
            ..Default::default()
        };
        let opa = OpaAuthorizer::new(&config).unwrap();
        assert_eq!(
            opa.rule_url("CreateDeployment"),
            "http://opa:8181/v1/data/deploymentv1/CreateDeploymentRequest?pretty=true&metrics=true"
        );
    }
}
