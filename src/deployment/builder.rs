//! # Deployment Record Builder
//!
//! [`DeploymentDraft`] is the engine's in-memory view of one deployment
//! between request validation and persistence. [`DeploymentDraft::build_record`]
//! turns it into the Deployment custom resource.

use super::model::{OverrideValues, TargetClusters};
use super::secrets::app_secret_names;
use super::targets::build_app_targets;
use crate::catalog::ResolvedApp;
use crate::config::AdmConfig;
use crate::constants::DEPLOYMENT_PROJECT;
use crate::crd::{
    package_id, Application, DependentDeploymentRef, Deployment, DeploymentPackageRef,
    DeploymentSpec, DeploymentType, HelmApp, Namespace, NetworkRef,
};
use crate::labels::deployment_labels;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// A deployment being created or updated
#[derive(Debug, Clone, Default)]
pub struct DeploymentDraft {
    pub name: String,
    /// Tenant id, also the store namespace
    pub namespace: String,
    /// Store UID once known
    pub deploy_id: String,
    pub resource_version: String,
    pub display_name: String,
    pub package_name: String,
    pub package_version: String,
    pub profile_name: String,
    pub deployment_type: DeploymentType,
    pub network_name: String,
    pub forbids_multiple_deployments: bool,
    pub namespaces: Vec<Namespace>,
    pub apps: Vec<ResolvedApp>,
    pub override_values: Vec<OverrideValues>,
    pub masked_override_values: Vec<OverrideValues>,
    /// Application name to JSON object of secret parameters
    pub parameter_template_secrets: BTreeMap<String, String>,
    pub target_clusters: Vec<TargetClusters>,
    /// Sub-packages required by the applications, keyed by package id
    pub required_packages: BTreeMap<String, DeploymentPackageRef>,
    /// Child deployment name to its package
    pub children: BTreeMap<String, DeploymentPackageRef>,
    /// Persisted record taken over instead of created
    pub adopted: bool,
}

impl DeploymentDraft {
    pub fn package_ref(&self) -> DeploymentPackageRef {
        DeploymentPackageRef {
            name: self.package_name.clone(),
            version: self.package_version.clone(),
            profile_name: self.profile_name.clone(),
            forbids_multiple_deployments: self.forbids_multiple_deployments,
            namespaces: self.namespaces.clone(),
        }
    }

    pub fn package_id(&self) -> String {
        package_id(&self.package_name, &self.package_version, &self.profile_name)
    }

    fn target_namespace(&self, app: &ResolvedApp) -> String {
        let explicit = self
            .override_values
            .iter()
            .find(|o| o.app_name == app.name)
            .map(|o| o.target_namespace.clone())
            .unwrap_or_default();
        [explicit, app.default_namespace.clone()]
            .into_iter()
            .find(|ns| !ns.is_empty())
            .unwrap_or_else(|| self.name.clone())
    }

    fn application(&self, app: &ResolvedApp, config: &AdmConfig) -> Application {
        let names = app_secret_names(self, app, config);
        let namespace = self.target_namespace(app);
        let namespace_labels = self
            .namespaces
            .iter()
            .find(|ns| ns.name == namespace)
            .map(|ns| ns.labels.clone())
            .unwrap_or_default();
        let dependent_deployment_packages = app
            .required_deployment_packages
            .iter()
            .map(|required| {
                let id = required.id();
                let forbids = self
                    .required_packages
                    .get(&id)
                    .is_some_and(|r| r.forbids_multiple_deployments);
                let reference = DeploymentPackageRef {
                    name: required.name.clone(),
                    version: required.version.clone(),
                    profile_name: required.profile.clone(),
                    forbids_multiple_deployments: forbids,
                    namespaces: Vec::new(),
                };
                (id, reference)
            })
            .collect();

        Application {
            name: app.name.clone(),
            version: self.package_version.clone(),
            namespace,
            namespace_labels,
            targets: build_app_targets(
                self.deployment_type,
                &self.target_clusters,
                &app.name,
                &self.namespace,
            ),
            profile_secret_name: names.profile,
            value_secret_name: names.values,
            depends_on: app.depends_on.clone(),
            redeploy_after_update: app.redeploy_after_update,
            ignore_resources: app.ignore_resources.clone(),
            helm_app: Some(HelmApp {
                chart: app.chart.clone(),
                version: app.version.clone(),
                repo: app.repo.clone(),
                repo_secret_name: names.repo,
                image_registry: app.image_registry.clone(),
                image_registry_secret_name: names.image,
            }),
            dependent_deployment_packages,
            enable_service_export: false,
        }
    }

    /// Deployment record of this draft
    ///
    /// `childDeploymentList` holds the children known to the draft; on update
    /// the caller copies the persisted list over it.
    pub fn build_record(&self, config: &AdmConfig) -> Deployment {
        let child_deployment_list = self
            .children
            .iter()
            .map(|(name, package)| {
                (
                    name.clone(),
                    DependentDeploymentRef {
                        deployment_package_ref: package.clone(),
                        deployment_name: name.clone(),
                    },
                )
            })
            .collect();

        let mut record = Deployment::new(
            &self.name,
            DeploymentSpec {
                display_name: self.display_name.clone(),
                project: DEPLOYMENT_PROJECT.to_string(),
                deployment_package_ref: self.package_ref(),
                applications: self.apps.iter().map(|a| self.application(a, config)).collect(),
                deployment_type: self.deployment_type,
                child_deployment_list,
                network_ref: (!self.network_name.is_empty())
                    .then(|| NetworkRef::new(self.network_name.clone())),
            },
        );
        record.metadata = ObjectMeta {
            name: Some(self.name.clone()),
            namespace: Some(self.namespace.clone()),
            labels: Some(deployment_labels(&self.name, &self.namespace)),
            resource_version: (!self.resource_version.is_empty())
                .then(|| self.resource_version.clone()),
            uid: (!self.deploy_id.is_empty()).then(|| self.deploy_id.clone()),
            ..Default::default()
        };
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RequiredDeploymentPackage;
    use crate::labels::{CLUSTER_NAME, TARGET_TENANT, TENANT};

    fn draft() -> DeploymentDraft {
        DeploymentDraft {
            name: "deployment-abcde".to_string(),
            namespace: "tenant".to_string(),
            display_name: "wordpress".to_string(),
            package_name: "wp".to_string(),
            package_version: "0.1.0".to_string(),
            profile_name: "default".to_string(),
            deployment_type: DeploymentType::Targeted,
            apps: vec![ResolvedApp {
                name: "wordpress".to_string(),
                chart: "wordpress".to_string(),
                version: "15.2.42".to_string(),
                default_namespace: "wp".to_string(),
                required_deployment_packages: vec![RequiredDeploymentPackage {
                    name: "db".to_string(),
                    version: "1.0.0".to_string(),
                    profile: "default".to_string(),
                }],
                ..Default::default()
            }],
            namespaces: vec![Namespace {
                name: "wp".to_string(),
                labels: BTreeMap::from([("tier".to_string(), "web".to_string())]),
                annotations: BTreeMap::new(),
            }],
            target_clusters: vec![TargetClusters {
                app_name: "wordpress".to_string(),
                labels: None,
                cluster_id: "cluster-1".to_string(),
            }],
            required_packages: BTreeMap::from([(
                "db/1.0.0/default".to_string(),
                DeploymentPackageRef {
                    name: "db".to_string(),
                    version: "1.0.0".to_string(),
                    profile_name: "default".to_string(),
                    forbids_multiple_deployments: true,
                    namespaces: Vec::new(),
                },
            )]),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_record() {
        let record = draft().build_record(&AdmConfig::default());
        assert_eq!(record.name(), "deployment-abcde");
        assert_eq!(
            record.metadata.labels.as_ref().and_then(|l| l.get(TENANT)).map(String::as_str),
            Some("tenant")
        );
        assert_eq!(record.spec.project, DEPLOYMENT_PROJECT);
        assert!(record.spec.network_ref.is_none());
        assert!(record.spec.child_deployment_list.is_empty());

        let app = &record.spec.applications[0];
        assert_eq!(app.version, "0.1.0");
        assert_eq!(app.namespace, "wp");
        assert_eq!(app.namespace_labels.get("tier").map(String::as_str), Some("web"));
        assert_eq!(app.profile_secret_name, "deployment-abcde-wordpress-15.2.42-profile");
        assert_eq!(app.targets[0].get(CLUSTER_NAME).map(String::as_str), Some("cluster-1"));
        assert_eq!(app.targets[0].get(TARGET_TENANT).map(String::as_str), Some("tenant"));
        assert!(app.dependent_deployment_packages["db/1.0.0/default"].forbids_multiple_deployments);
    }

    #[test]
    fn test_namespace_falls_back_to_override_then_name() {
        let mut d = draft();
        d.override_values = vec![OverrideValues {
            app_name: "wordpress".to_string(),
            target_namespace: "custom".to_string(),
            values: None,
        }];
        let record = d.build_record(&AdmConfig::default());
        assert_eq!(record.spec.applications[0].namespace, "custom");

        d.override_values.clear();
        d.apps[0].default_namespace.clear();
        let record = d.build_record(&AdmConfig::default());
        assert_eq!(record.spec.applications[0].namespace, "deployment-abcde");
    }

    #[test]
    fn test_children_and_network() {
        let mut d = draft();
        d.network_name = "net-1".to_string();
        d.children.insert("deployment-child".to_string(), DeploymentPackageRef::default());
        let record = d.build_record(&AdmConfig::default());
        assert_eq!(record.spec.network_ref.unwrap().name, "net-1");
        assert_eq!(
            record.spec.child_deployment_list["deployment-child"].deployment_name,
            "deployment-child"
        );
    }
}
