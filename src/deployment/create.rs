//! # Create
//!
//! Children are written before their parents so every parent record can
//! carry the names of its children. Parent back-edges are patched into the
//! children's status once the whole tree is persisted.

use super::builder::DeploymentDraft;
use super::dependency::{add_target_entries, Traversal};
use super::init::Scenario;
use super::model::ApiDeployment;
use super::secrets::{create_git_credential_secret, create_secrets, set_owner_references};
use super::{incomplete_request, observe, DeploymentService};
use crate::catalog::set_deployed_flag;
use crate::config::AdmConfig;
use crate::crd::{DependentDeploymentRef, DeploymentPackageRef};
use crate::error::{AdmError, AdmResult};
use crate::labels::tenant_selector;
use crate::observability::metrics;
use crate::tenant::{require_tenant, RequestMetadata};
use crate::validation::validate_app_version;
use serde_json::json;
use tracing::{info, info_span, warn, Instrument};

fn validate_request(request: &ApiDeployment) -> AdmResult<()> {
    if request.app_name.is_empty() || request.app_version.is_empty() {
        return Err(incomplete_request());
    }
    validate_app_version("app_version", &request.app_version)
}

/// Status patch recording `parent` on one of its children
fn parent_link(parent: &DeploymentDraft) -> serde_json::Value {
    let reference = DependentDeploymentRef {
        deployment_package_ref: DeploymentPackageRef {
            namespaces: Vec::new(),
            ..parent.package_ref()
        },
        deployment_name: parent.name.clone(),
    };
    json!({ "parentDeploymentList": { parent.name.clone(): reference } })
}

impl DeploymentService {
    /// Create a deployment and every child its packages require; returns the root UID
    pub async fn create_deployment(
        &self,
        metadata: &RequestMetadata,
        request: ApiDeployment,
    ) -> AdmResult<String> {
        let span = info_span!(
            "adm.create_deployment",
            package = %request.app_name,
            version = %request.app_version
        );
        observe("CreateDeployment", async move {
            let _guard = self.write_lock.lock().await;
            validate_request(&request)?;
            self.authorize("CreateDeployment", &request, metadata, "cannot create deployment")
                .await?;
            let tenant = require_tenant(metadata)?;
            let config = self.config().await;

            let mut traversal = Traversal::default();
            let mut root = self
                .init_draft(request, Scenario::Create, &tenant, &config, &mut traversal, 0)
                .await?;
            self.check_display_name_unique(&root).await?;

            create_git_credential_secret(
                self.store.as_ref(),
                self.credentials.as_ref(),
                &config,
                &tenant,
            )
            .await?;

            let mut children = traversal.into_children();
            for child in &mut children {
                if child.adopted {
                    self.refresh_adopted_child(child).await?;
                } else {
                    self.persist(child, &config).await?;
                    metrics::increment_child_deployments_created();
                }
            }
            self.persist(&mut root, &config).await?;

            for parent in children.iter().chain(std::iter::once(&root)) {
                self.link_children(parent).await?;
            }

            if config.api_ext_enabled {
                self.create_api_extensions(&root).await?;
            }
            if let Err(e) = set_deployed_flag(
                self.catalog.as_ref(),
                &root.package_name,
                &root.package_version,
                true,
            )
            .await
            {
                warn!(
                    package = %root.package_id(),
                    error = %e,
                    "cannot mark deployment package as deployed"
                );
            }

            info!(
                deployment.name = %root.name,
                deployment.id = %root.deploy_id,
                tenant = %tenant,
                children = children.len(),
                "Created deployment"
            );
            Ok(root.deploy_id)
        })
        .instrument(span)
        .await
    }

    /// Reject a root whose display name is taken by a deployment of the same package
    async fn check_display_name_unique(&self, root: &DeploymentDraft) -> AdmResult<()> {
        let id = root.package_id();
        let existing = self
            .store
            .list_deployments(&root.namespace, &tenant_selector(&root.namespace))
            .await?;
        match existing.iter().find(|d| {
            d.spec.deployment_package_ref.package_id() == id
                && d.spec.display_name == root.display_name
        }) {
            Some(duplicate) => Err(AdmError::AlreadyExists(format!(
                "Duplicate deployment exists with same name {}, deployID: {}",
                root.display_name,
                duplicate.uid()
            ))),
            None => Ok(()),
        }
    }

    /// Write secrets and the record of a new deployment, then own its secrets
    async fn persist(&self, draft: &mut DeploymentDraft, config: &AdmConfig) -> AdmResult<()> {
        create_secrets(self.store.as_ref(), config, draft).await?;
        let created = self
            .store
            .create_deployment(&draft.namespace, &draft.build_record(config))
            .await?;
        draft.deploy_id = created.uid().to_string();
        set_owner_references(self.store.as_ref(), config, draft).await
    }

    /// Merge this request's children and targets into an adopted record
    async fn refresh_adopted_child(&self, child: &DeploymentDraft) -> AdmResult<()> {
        let mut record = self
            .store
            .get_deployment(&child.namespace, &child.name)
            .await?;
        for (name, package) in &child.children {
            record.spec.child_deployment_list.insert(
                name.clone(),
                DependentDeploymentRef {
                    deployment_package_ref: package.clone(),
                    deployment_name: name.clone(),
                },
            );
        }
        let deployment_type = record.spec.deployment_type;
        add_target_entries(
            &mut record,
            deployment_type,
            &child.target_clusters,
            &child.namespace,
        );
        self.store
            .update_deployment(&child.namespace, &record)
            .await?;
        info!(deployment.name = %child.name, "Updated adopted deployment");
        Ok(())
    }

    /// Record `parent` in the status of each of its children
    async fn link_children(&self, parent: &DeploymentDraft) -> AdmResult<()> {
        let patch = parent_link(parent);
        for child in parent.children.keys() {
            self.store
                .patch_deployment_status(&parent.namespace, child, &patch)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_request() {
        assert_eq!(
            validate_request(&ApiDeployment::default()).unwrap_err(),
            incomplete_request()
        );
        let request = ApiDeployment {
            app_name: "wp".to_string(),
            app_version: "0.1.0".to_string(),
            ..Default::default()
        };
        assert!(validate_request(&request).is_ok());
        let request = ApiDeployment {
            app_version: "Bad Version".to_string(),
            ..request
        };
        assert_eq!(validate_request(&request).unwrap_err().as_str(), "invalid");
    }

    #[test]
    fn test_parent_link_patch() {
        let parent = DeploymentDraft {
            name: "deployment-aaaaa".to_string(),
            package_name: "wp".to_string(),
            package_version: "0.1.0".to_string(),
            profile_name: "default".to_string(),
            ..Default::default()
        };
        let patch = parent_link(&parent);
        let entry = &patch["parentDeploymentList"]["deployment-aaaaa"];
        assert_eq!(entry["deploymentName"], "deployment-aaaaa");
        assert_eq!(entry["deploymentPackageRef"]["name"], "wp");
        assert_eq!(entry["deploymentPackageRef"]["profileName"], "default");
    }
}
