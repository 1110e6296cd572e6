//! # Update
//!
//! An update may change profile, overrides, targets and display name, but
//! never the set of child packages.

use super::builder::DeploymentDraft;
use super::dependency::{propagate_targets, Traversal};
use super::init::Scenario;
use super::model::ApiDeployment;
use super::secrets::{create_secrets, delete_secrets, set_owner_references};
use super::{incomplete_request, observe, DeploymentService};
use crate::crd::{Deployment, DeploymentPackageRef};
use crate::error::{AdmError, AdmResult};
use crate::tenant::{require_tenant, RequestMetadata};
use crate::validation::{validate_app_version, validate_id};
use std::collections::BTreeMap;
use tracing::{debug, info, info_span, warn, Instrument};

/// Package name to `version/profile`
fn package_versions<'a>(
    refs: impl Iterator<Item = &'a DeploymentPackageRef>,
) -> BTreeMap<String, String> {
    refs.map(|r| (r.name.clone(), format!("{}/{}", r.version, r.profile_name)))
        .collect()
}

/// Reject updates that would add, drop or re-version a child package
fn check_children_unchanged(existing: &Deployment, draft: &DeploymentDraft) -> AdmResult<()> {
    let current = package_versions(
        existing
            .spec
            .child_deployment_list
            .values()
            .map(|c| &c.deployment_package_ref),
    );
    let required = package_versions(draft.required_packages.values());
    if current != required {
        return Err(AdmError::FailedPrecondition(format!(
            "cannot update deployment {}: dependent deployment packages changed from {current:?} to {required:?}",
            existing.name()
        )));
    }
    Ok(())
}

impl DeploymentService {
    /// Replace the deployment's configuration; returns the updated view
    pub async fn update_deployment(
        &self,
        metadata: &RequestMetadata,
        deployment_id: &str,
        request: ApiDeployment,
    ) -> AdmResult<ApiDeployment> {
        let span = info_span!("adm.update_deployment", deployment.id = %deployment_id);
        observe("UpdateDeployment", async move {
            let _guard = self.write_lock.lock().await;
            if deployment_id.is_empty()
                || request.app_name.is_empty()
                || request.app_version.is_empty()
            {
                return Err(incomplete_request());
            }
            validate_id("depl_id", deployment_id)?;
            validate_app_version("app_version", &request.app_version)?;
            self.authorize("UpdateDeployment", &request, metadata, "cannot update deployment")
                .await?;
            let tenant = require_tenant(metadata)?;
            let config = self.config().await;

            let Some(existing) = self.find_by_uid(&tenant, deployment_id).await? else {
                return Err(AdmError::NotFound(format!(
                    "deployment {deployment_id} not found while updating deployment"
                )));
            };
            if existing
                .metadata
                .resource_version
                .as_deref()
                .unwrap_or_default()
                .is_empty()
            {
                return Err(AdmError::NotFound(format!(
                    "deployment {deployment_id} has no resource version"
                )));
            }
            let parents = existing.parents();
            if !parents.is_empty() {
                return Err(AdmError::FailedPrecondition(format!(
                    "cannot update deployment {}: {} parent deployments running",
                    existing.name(),
                    parents.len()
                )));
            }

            let mut traversal = Traversal::default();
            let draft = self
                .init_draft(
                    request,
                    Scenario::Update(&existing),
                    &tenant,
                    &config,
                    &mut traversal,
                    0,
                )
                .await?;
            check_children_unchanged(&existing, &draft)?;

            delete_secrets(self.store.as_ref(), &config, &existing).await?;
            create_secrets(self.store.as_ref(), &config, &draft).await?;

            let mut record = draft.build_record(&config);
            record.spec.child_deployment_list = existing.spec.child_deployment_list.clone();
            let updated = self.store.update_deployment(&tenant, &record).await?;

            self.propagate_to_children(&updated).await;
            set_owner_references(self.store.as_ref(), &config, &draft).await?;

            info!(
                deployment.name = %draft.name,
                deployment.id = %deployment_id,
                tenant = %tenant,
                "Updated deployment"
            );
            self.deployment_detail(&tenant, deployment_id).await
        })
        .instrument(span)
        .await
    }

    /// Push the parent's targets down to every child; failures are logged
    async fn propagate_to_children(&self, parent: &Deployment) {
        let ns = parent.metadata.namespace.as_deref().unwrap_or_default();
        for child_name in parent.spec.child_deployment_list.keys() {
            let mut child = match self.store.get_deployment(ns, child_name).await {
                Ok(child) => child,
                Err(e) => {
                    warn!(child = %child_name, error = %e, "cannot get child deployment");
                    continue;
                }
            };
            if !propagate_targets(parent, &mut child) {
                debug!(child = %child_name, "Child already targets every parent cluster");
                continue;
            }
            if let Err(e) = self.store.update_deployment(ns, &child).await {
                warn!(
                    child = %child_name,
                    error = %e,
                    "cannot propagate targets to child deployment"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{DependentDeploymentRef, DeploymentSpec};

    fn package(name: &str, version: &str) -> DeploymentPackageRef {
        DeploymentPackageRef {
            name: name.to_string(),
            version: version.to_string(),
            profile_name: "default".to_string(),
            ..Default::default()
        }
    }

    fn existing_with_child(child: DeploymentPackageRef) -> Deployment {
        Deployment::new(
            "deployment-aaaaa",
            DeploymentSpec {
                child_deployment_list: BTreeMap::from([(
                    "deployment-bbbbb".to_string(),
                    DependentDeploymentRef {
                        deployment_package_ref: child,
                        deployment_name: "deployment-bbbbb".to_string(),
                    },
                )]),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_same_children_accepted() {
        let existing = existing_with_child(package("db", "1.0.0"));
        let mut draft = DeploymentDraft::default();
        draft
            .required_packages
            .insert("db/1.0.0/default".to_string(), package("db", "1.0.0"));
        check_children_unchanged(&existing, &draft).unwrap();
    }

    #[test]
    fn test_changed_children_rejected() {
        let existing = existing_with_child(package("db", "1.0.0"));
        let mut draft = DeploymentDraft::default();
        draft
            .required_packages
            .insert("db/2.0.0/default".to_string(), package("db", "2.0.0"));
        assert_eq!(
            check_children_unchanged(&existing, &draft).unwrap_err().as_str(),
            "failed_precondition"
        );
        check_children_unchanged(&existing, &DeploymentDraft::default()).unwrap_err();
    }
}
