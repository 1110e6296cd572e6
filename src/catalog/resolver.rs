//! # Catalog Resolver
//!
//! Resolves a (package, version, profile) triple into the ordered list of
//! applications a Deployment is built from: chart coordinates, registries
//! with credentials, dependency edges, parameter templates and required
//! sub-packages.

use super::{
    ApiExtensionTemplate, Artifact, CatalogApplication, CatalogClient, DeploymentPackage,
    ParameterTemplate, Registry,
};
use crate::constants::GRAFANA_ARTIFACT_PURPOSE;
use crate::crd::{package_id, IgnoreResource};
use crate::error::{AdmError, AdmResult};
use std::collections::BTreeMap;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Helm registry credentials
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct HelmCredential {
    pub username: String,
    pub password: String,
    pub cacerts: String,
}

impl std::fmt::Debug for HelmCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelmCredential")
            .field("username", &self.username)
            .field("password", &"***")
            .field("cacerts", &!self.cacerts.is_empty())
            .finish()
    }
}

/// Image registry credentials
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DockerCredential {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for DockerCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerCredential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Sub-package required by an application profile, with its effective profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredDeploymentPackage {
    pub name: String,
    pub version: String,
    pub profile: String,
}

impl RequiredDeploymentPackage {
    pub fn id(&self) -> String {
        package_id(&self.name, &self.version, &self.profile)
    }
}

/// One application of a resolved package
#[derive(Debug, Clone, Default)]
pub struct ResolvedApp {
    pub name: String,
    /// Helm registry root URL
    pub repo: String,
    pub image_registry: String,
    pub chart: String,
    /// Chart version
    pub version: String,
    /// Application profile name
    pub profile: String,
    /// Chart values of the profile (YAML)
    pub values: String,
    pub depends_on: Vec<String>,
    pub redeploy_after_update: bool,
    pub default_namespace: String,
    pub helm_credential: HelmCredential,
    pub docker_credential: DockerCredential,
    pub ignore_resources: Vec<IgnoreResource>,
    pub required_deployment_packages: Vec<RequiredDeploymentPackage>,
    pub parameter_templates: Vec<ParameterTemplate>,
}

/// A package resolved against the catalog
#[derive(Debug, Clone, Default)]
pub struct ResolvedPackage {
    pub package: DeploymentPackage,
    pub apps: Vec<ResolvedApp>,
    /// Effective profile (request profile or package default)
    pub profile_name: String,
}

/// Resolve a deployment package and its applications
///
/// An empty `profile_name` falls back to the package default profile. A
/// named profile the package does not declare fails with invalid.
pub async fn resolve_deployment_package(
    client: &dyn CatalogClient,
    name: &str,
    version: &str,
    profile_name: &str,
    redeploy_after_update: bool,
) -> AdmResult<ResolvedPackage> {
    info!(package = name, version = version, "Resolving deployment package");
    let package = client.get_deployment_package(name, version).await?;

    let mut depends_on: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for dep in &package.application_dependencies {
        depends_on
            .entry(dep.name.clone())
            .or_default()
            .push(dep.requires.clone());
    }

    let mut profile_name = profile_name.to_string();
    if profile_name.is_empty() && !package.default_profile_name.is_empty() {
        profile_name.clone_from(&package.default_profile_name);
    }
    let app_profiles = if profile_name.is_empty() {
        BTreeMap::new()
    } else {
        package
            .profiles
            .iter()
            .find(|p| p.name == profile_name)
            .map(|p| p.application_profiles.clone())
            .ok_or_else(|| {
                AdmError::invalid(format!("deployment Profile {profile_name} not found"))
            })?
    };

    let mut apps = Vec::with_capacity(package.application_references.len());
    for app_ref in &package.application_references {
        let app = client.get_application(&app_ref.name, &app_ref.version).await?;
        let helm_registry = client.get_registry(&app.helm_registry_name, true).await?;
        let image_registry = if app.image_registry_name.is_empty() {
            None
        } else {
            Some(client.get_registry(&app.image_registry_name, true).await?)
        };

        let app_profile_name = app_profiles.get(&app.name).cloned().unwrap_or_default();
        let app_profile = app.profiles.iter().find(|p| p.name == app_profile_name);
        if app_profile.is_none_or(|p| p.chart_values.is_empty()) {
            debug!(application = %app.name, "Application has no chart values for its profile");
        }

        let mut resolved = new_resolved_app(
            &app,
            &helm_registry,
            image_registry.as_ref(),
            &app_profile_name,
            redeploy_after_update,
        );
        resolved.values = app_profile.map(|p| p.chart_values.clone()).unwrap_or_default();
        resolved.depends_on = depends_on.get(&app.name).cloned().unwrap_or_default();
        resolved.default_namespace = package
            .default_namespaces
            .get(&app_ref.name)
            .cloned()
            .unwrap_or_default();

        if let Some(profile) = app_profile {
            for template in &profile.parameter_templates {
                let mut template = template.clone();
                if template.display_name.is_empty() {
                    template.display_name.clone_from(&template.name);
                }
                if template.mandatory && !template.default.is_empty() {
                    return Err(AdmError::invalid(format!(
                        "application {}: mandatory parameter template {} should have no default value",
                        app_ref.name, template.display_name
                    )));
                }
                if template.secret && !template.default.is_empty() {
                    return Err(AdmError::invalid(format!(
                        "application {}: secret parameter template {} should have no default value",
                        app_ref.name, template.display_name
                    )));
                }
                resolved.parameter_templates.push(template);
            }

            for requirement in &profile.deployment_requirement {
                let required = client
                    .get_deployment_package(&requirement.name, &requirement.version)
                    .await?;
                let profile = if !requirement.deployment_profile_name.is_empty() {
                    requirement.deployment_profile_name.clone()
                } else if !required.default_profile_name.is_empty() {
                    required.default_profile_name.clone()
                } else {
                    return Err(AdmError::invalid(
                        "profile name and default profile name for dependent deployment package are empty",
                    ));
                };
                resolved
                    .required_deployment_packages
                    .push(RequiredDeploymentPackage {
                        name: requirement.name.clone(),
                        version: requirement.version.clone(),
                        profile,
                    });
            }
        }

        apps.push(resolved);
    }

    Ok(ResolvedPackage {
        package,
        apps,
        profile_name,
    })
}

fn new_resolved_app(
    app: &CatalogApplication,
    helm_registry: &Registry,
    image_registry: Option<&Registry>,
    profile: &str,
    redeploy_after_update: bool,
) -> ResolvedApp {
    let mut resolved = ResolvedApp {
        name: app.name.clone(),
        chart: app.chart_name.clone(),
        version: app.chart_version.clone(),
        repo: helm_registry.root_url.clone(),
        profile: profile.to_string(),
        redeploy_after_update,
        helm_credential: HelmCredential {
            username: helm_registry.username.clone(),
            password: helm_registry.auth_token.clone(),
            cacerts: helm_registry.cacerts.clone(),
        },
        ignore_resources: app
            .ignored_resources
            .iter()
            .map(|r| IgnoreResource {
                name: r.name.clone(),
                kind: r.kind.clone(),
                namespace: r.namespace.clone(),
            })
            .collect(),
        ..Default::default()
    };
    if let Some(registry) = image_registry {
        resolved.image_registry.clone_from(&registry.root_url);
        resolved.docker_credential = DockerCredential {
            username: registry.username.clone(),
            password: registry.auth_token.clone(),
        };
    }
    resolved
}

/// API extensions the package declares
pub async fn list_api_extensions(
    client: &dyn CatalogClient,
    name: &str,
    version: &str,
) -> AdmResult<Vec<ApiExtensionTemplate>> {
    Ok(client.get_deployment_package(name, version).await?.extensions)
}

/// Catalog artifacts the package references with the `grafana` purpose
pub async fn list_grafana_artifacts(
    client: &dyn CatalogClient,
    name: &str,
    version: &str,
) -> AdmResult<Vec<Artifact>> {
    let package = client.get_deployment_package(name, version).await?;
    let artifacts = client.list_artifacts().await?;
    let mut grafana = Vec::new();
    for reference in &package.artifacts {
        if !reference.purpose.eq_ignore_ascii_case(GRAFANA_ARTIFACT_PURPOSE) {
            continue;
        }
        grafana.extend(artifacts.iter().filter(|a| a.name == reference.name).cloned());
    }
    Ok(grafana)
}

/// Set the package `isDeployed` flag; no-op when it already has that value
pub async fn set_deployed_flag(
    client: &dyn CatalogClient,
    name: &str,
    version: &str,
    is_deployed: bool,
) -> AdmResult<()> {
    let mut package = client.get_deployment_package(name, version).await?;
    if package.is_deployed == is_deployed {
        return Ok(());
    }
    package.is_deployed = is_deployed;
    client.update_deployment_package(&package).await
}
