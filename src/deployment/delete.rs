//! # Delete
//!
//! `PARENT_ONLY` removes one record and unlinks it from its children.
//! `ALL` removes the record and every descendant, provided no descendant
//! is also used by a deployment outside that closure.

use super::dependency::{closure_is_self_contained, collect_descendants};
use super::model::DeleteType;
use super::secrets::delete_secrets;
use super::{incomplete_request, observe, DeploymentService};
use crate::config::AdmConfig;
use crate::crd::Deployment;
use crate::error::{AdmError, AdmResult};
use crate::labels::tenant_selector;
use crate::tenant::{require_tenant, RequestMetadata};
use crate::validation::validate_id;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info, info_span, warn, Instrument};

/// Status patch removing `parent` from a child's parent list
fn parent_unlink(parent: &str) -> serde_json::Value {
    json!({ "parentDeploymentList": { parent: null } })
}

impl DeploymentService {
    pub async fn delete_deployment(
        &self,
        metadata: &RequestMetadata,
        deployment_id: &str,
        delete_type: DeleteType,
    ) -> AdmResult<()> {
        let span = info_span!(
            "adm.delete_deployment",
            deployment.id = %deployment_id,
            delete_type = ?delete_type
        );
        observe("DeleteDeployment", async move {
            let _guard = self.write_lock.lock().await;
            if deployment_id.is_empty() {
                return Err(incomplete_request());
            }
            validate_id("depl_id", deployment_id)?;
            self.authorize(
                "DeleteDeployment",
                &json!({ "deplId": deployment_id, "deleteType": delete_type }),
                metadata,
                "cannot delete deployment",
            )
            .await?;
            let tenant = require_tenant(metadata)?;
            let config = self.config().await;

            let all: BTreeMap<String, Deployment> = self
                .store
                .list_deployments(&tenant, &tenant_selector(&tenant))
                .await?
                .into_iter()
                .map(|d| (d.name().to_string(), d))
                .collect();
            let Some(target) = all.values().find(|d| d.uid() == deployment_id) else {
                return Err(AdmError::NotFound(format!(
                    "deployment id {deployment_id} not found"
                )));
            };
            let parents = target.parents();
            if !parents.is_empty() {
                return Err(AdmError::FailedPrecondition(format!(
                    "cannot delete deployment {}: {} parent deployments running",
                    target.name(),
                    parents.len()
                )));
            }

            match delete_type {
                DeleteType::ParentOnly => {
                    self.remove(target, &config).await?;
                    self.unlink_children(target).await?;
                    info!(deployment.name = %target.name(), tenant = %tenant, "Deleted deployment");
                }
                DeleteType::All => {
                    let mut closure = BTreeMap::new();
                    collect_descendants(target.name(), &all, &mut closure, 0)?;
                    if !closure_is_self_contained(&closure) {
                        return Err(AdmError::FailedPrecondition(format!(
                            "cannot delete deployment {}: a dependent deployment is used by other deployments",
                            target.name()
                        )));
                    }
                    for deployment in closure.values() {
                        self.remove(deployment, &config).await?;
                    }
                    info!(
                        deployment.name = %target.name(),
                        tenant = %tenant,
                        deleted = closure.len(),
                        "Deleted deployment and its dependencies"
                    );
                }
            }
            Ok(())
        })
        .instrument(span)
        .await
    }

    /// Delete the record, then its secrets and API extensions on a best-effort basis
    async fn remove(&self, deployment: &Deployment, config: &AdmConfig) -> AdmResult<()> {
        let ns = deployment.metadata.namespace.as_deref().unwrap_or_default();
        match self.store.delete_deployment(ns, deployment.name()).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(deployment.name = %deployment.name(), "Deployment already gone");
            }
            Err(e) => return Err(e),
        }
        if let Err(e) = delete_secrets(self.store.as_ref(), config, deployment).await {
            warn!(
                deployment.name = %deployment.name(),
                error = %e,
                "cannot delete deployment secrets"
            );
        }
        if config.api_ext_enabled {
            if let Err(e) = self.delete_api_extensions(deployment).await {
                warn!(
                    deployment.name = %deployment.name(),
                    error = %e,
                    "cannot delete API extensions"
                );
            }
        }
        Ok(())
    }

    /// Drop the back-edge to `parent` from each of its children
    async fn unlink_children(&self, parent: &Deployment) -> AdmResult<()> {
        let ns = parent.metadata.namespace.as_deref().unwrap_or_default();
        let patch = parent_unlink(parent.name());
        for child in parent.spec.child_deployment_list.keys() {
            match self.store.patch_deployment_status(ns, child, &patch).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    debug!(child = %child, "Child deployment already gone");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_unlink_patch_nulls_entry() {
        let patch = parent_unlink("deployment-aaaaa");
        assert!(patch["parentDeploymentList"]["deployment-aaaaa"].is_null());
        assert_eq!(patch["parentDeploymentList"].as_object().map(|m| m.len()), Some(1));
    }
}
