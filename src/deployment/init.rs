//! # Draft Initialization
//!
//! Turns an API request into a [`DeploymentDraft`]: request checks, catalog
//! resolution, namespace checks, the parameter template check and the
//! dependency traversal.

use super::builder::DeploymentDraft;
use super::dependency::Traversal;
use super::model::{ApiDeployment, OverrideValues};
use super::secrets::{parameter_secret_name, previous_secret_values};
use super::targets::{merge_all_app_target_clusters, normalize_targets};
use super::templates::{check_parameter_templates, unmask_secrets};
use super::DeploymentService;
use crate::catalog::resolve_deployment_package;
use crate::config::AdmConfig;
use crate::constants::{DEPLOYMENT_NAME_PREFIX, DEPLOYMENT_NAME_SUFFIX_LEN, MAX_DEPTH};
use crate::crd::{Deployment, DeploymentType, Namespace};
use crate::error::{AdmError, AdmResult};
use crate::validation::{validate_namespace_name, validate_override_app_name};
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

/// What the draft is initialized for
#[derive(Debug, Clone, Copy)]
pub(crate) enum Scenario<'a> {
    Create,
    Update(&'a Deployment),
}

/// Catalog failures surface as not-found unless the resolver rejected the input
pub(crate) fn catalog_error(e: AdmError) -> AdmError {
    match e {
        AdmError::Invalid(_) => e,
        other => AdmError::NotFound(other.message().to_string()),
    }
}

fn generate_name() -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(DEPLOYMENT_NAME_SUFFIX_LEN)
        .collect();
    format!("{DEPLOYMENT_NAME_PREFIX}{suffix}")
}

fn check_override_entries(overrides: &[OverrideValues]) -> AdmResult<()> {
    for (index, entry) in overrides.iter().enumerate() {
        validate_override_app_name(index, &entry.app_name)?;
        if entry.values.is_none() && entry.target_namespace.is_empty() {
            return Err(AdmError::invalid(
                "missing overrideValues.targetNamespace or overrideValues.values in request",
            ));
        }
        if !entry.target_namespace.is_empty() {
            validate_namespace_name(&entry.target_namespace)?;
        }
    }
    Ok(())
}

fn check_display_name(display_name: &str) -> AdmResult<()> {
    if display_name.trim() != display_name {
        return Err(AdmError::invalid(
            "display-name cannot contain leading or trailing spaces",
        ));
    }
    Ok(())
}

impl DeploymentService {
    /// Build the draft of `request` for `tenant`
    ///
    /// Children found on create are collected in `traversal`; `depth` is the
    /// distance from the root request.
    pub(crate) fn init_draft<'a>(
        &'a self,
        mut request: ApiDeployment,
        scenario: Scenario<'a>,
        tenant: &'a str,
        config: &'a AdmConfig,
        traversal: &'a mut Traversal,
        depth: usize,
    ) -> BoxFuture<'a, AdmResult<DeploymentDraft>> {
        async move {
            if depth > MAX_DEPTH {
                return Err(AdmError::internal(format!(
                    "deployment package dependencies exceed the maximum depth of {MAX_DEPTH}"
                )));
            }

            let deployment_type = DeploymentType::parse(&request.deployment_type);
            request.deployment_type = deployment_type.as_str().to_string();
            normalize_targets(&mut request, tenant)?;
            check_override_entries(&request.override_values)?;

            let resolved = resolve_deployment_package(
                self.catalog.as_ref(),
                &request.app_name,
                &request.app_version,
                &request.profile_name,
                config.redeploy_after_update,
            )
            .await
            .map_err(|e| {
                warn!(package = %request.app_name, error = %e, "cannot resolve deployment package");
                catalog_error(e)
            })?;

            let mut namespaces = Vec::with_capacity(resolved.package.namespaces.len());
            for ns in &resolved.package.namespaces {
                validate_namespace_name(&ns.name)?;
                namespaces.push(Namespace {
                    name: ns.name.clone(),
                    labels: ns.labels.clone(),
                    annotations: ns.annotations.clone(),
                });
            }

            let mut draft = DeploymentDraft {
                namespace: tenant.to_string(),
                package_name: request.app_name.clone(),
                package_version: request.app_version.clone(),
                profile_name: resolved.profile_name.clone(),
                deployment_type,
                network_name: request.network_name.clone(),
                forbids_multiple_deployments: resolved.package.forbids_multiple_deployments,
                namespaces,
                apps: resolved.apps,
                ..Default::default()
            };

            if let Scenario::Update(existing) = scenario {
                draft.name = existing.name().to_string();
                for app in &draft.apps {
                    let secret = parameter_secret_name(&draft.name, &app.name, &draft.profile_name);
                    let Some(previous) =
                        previous_secret_values(self.store.as_ref(), tenant, &secret).await
                    else {
                        continue;
                    };
                    for entry in request
                        .override_values
                        .iter_mut()
                        .filter(|o| o.app_name == app.name)
                    {
                        if let Some(values) = entry.values.as_mut() {
                            unmask_secrets(values, &previous)?;
                        }
                    }
                }
            }

            let checked = check_parameter_templates(&draft.apps, &request.override_values)?;
            draft.override_values = checked.values;
            draft.masked_override_values = checked.masked;
            draft.parameter_template_secrets = checked.secrets;

            match scenario {
                Scenario::Create => {
                    draft.name = generate_name();
                    self.store.ensure_namespace(tenant).await?;
                    if request.display_name.is_empty() {
                        draft.display_name = draft.name.clone();
                    } else {
                        check_display_name(&request.display_name)?;
                        draft.display_name = request.display_name.clone();
                    }
                }
                Scenario::Update(existing) => {
                    draft.deploy_id = existing.uid().to_string();
                    draft.resource_version =
                        existing.metadata.resource_version.clone().unwrap_or_default();
                    draft.display_name = if request.display_name.is_empty() {
                        existing.spec.display_name.clone()
                    } else {
                        check_display_name(&request.display_name)?;
                        request.display_name.clone()
                    };
                    if draft.network_name.is_empty() {
                        if let Some(network) = &existing.spec.network_ref {
                            draft.network_name = network.name.clone();
                        }
                    }
                }
            }

            let app_names: Vec<String> = draft.apps.iter().map(|a| a.name.clone()).collect();
            merge_all_app_target_clusters(&mut request, &app_names);
            draft.target_clusters = request.target_clusters;

            let create = matches!(scenario, Scenario::Create);
            self.add_dependencies(&mut draft, create, config, traversal, depth)
                .await?;
            debug!(
                deployment.name = %draft.name,
                package = %draft.package_id(),
                children = draft.children.len(),
                depth,
                "Initialized deployment draft"
            );
            Ok(draft)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_name_shape() {
        let name = generate_name();
        assert!(name.starts_with(DEPLOYMENT_NAME_PREFIX));
        let suffix = &name[DEPLOYMENT_NAME_PREFIX.len()..];
        assert_eq!(suffix.len(), DEPLOYMENT_NAME_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_override_entry_rules() {
        let entry = |app: &str, ns: &str| OverrideValues {
            app_name: app.to_string(),
            target_namespace: ns.to_string(),
            values: None,
        };
        assert!(check_override_entries(&[entry("wordpress", "wp")]).is_ok());
        assert_eq!(
            check_override_entries(&[entry("wordpress", "")]).unwrap_err().message(),
            "missing overrideValues.targetNamespace or overrideValues.values in request"
        );
        assert_eq!(
            check_override_entries(&[entry("wordpress", "default")]).unwrap_err().as_str(),
            "invalid"
        );
    }

    #[test]
    fn test_display_name_spaces() {
        assert!(check_display_name("wordpress").is_ok());
        assert!(check_display_name("my wordpress").is_ok());
        assert_eq!(
            check_display_name(" wordpress").unwrap_err().message(),
            "display-name cannot contain leading or trailing spaces"
        );
    }

    #[test]
    fn test_catalog_error_mapping() {
        assert_eq!(
            catalog_error(AdmError::Unavailable("down".to_string())),
            AdmError::NotFound("down".to_string())
        );
        assert_eq!(catalog_error(AdmError::invalid("bad")), AdmError::invalid("bad"));
    }
}
