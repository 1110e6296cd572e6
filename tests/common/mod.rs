//! Shared fixtures: an in-memory store, a static catalog and a service
//! wired to both.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use app_deployment_manager::authz::AllowAll;
use app_deployment_manager::catalog::{
    ApplicationProfile, ApplicationReference, CatalogApplication, CatalogClient, DeploymentPackage,
    DeploymentProfile, DeploymentRequirement, ParameterTemplate, Registry, StaticCatalog,
};
use app_deployment_manager::config::{AdmConfig, SharedAdmConfig};
use app_deployment_manager::credentials::StaticCredentialStore;
use app_deployment_manager::deployment::{ApiDeployment, DeploymentService, TargetClusters};
use app_deployment_manager::store::{MemoryStore, ObjectStore};
use app_deployment_manager::tenant::{metadata_for_tenant, RequestMetadata};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const TENANT: &str = "tenant-a";
pub const HELM_REGISTRY: &str = "harbor-helm";

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub catalog: Arc<StaticCatalog>,
    pub config: SharedAdmConfig,
    pub service: Arc<DeploymentService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AdmConfig::default())
    }

    pub fn with_config(config: AdmConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(StaticCatalog::new());
        catalog.add_registry(Registry {
            name: HELM_REGISTRY.to_string(),
            root_url: "oci://registry.example.com/charts".to_string(),
            ..Default::default()
        });
        let config: SharedAdmConfig = Arc::new(RwLock::new(config));
        let service = Arc::new(DeploymentService::new(
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::clone(&catalog) as Arc<dyn CatalogClient>,
            Arc::new(AllowAll),
            Arc::new(StaticCredentialStore::new("git", "secret")),
            Arc::clone(&config),
        ));
        Self {
            store,
            catalog,
            config,
            service,
        }
    }

    /// Register a one-application package with a `default` profile
    pub fn add_package(&self, spec: PackageSpec<'_>) {
        self.catalog.add_application(CatalogApplication {
            name: spec.app.to_string(),
            version: spec.version.to_string(),
            chart_name: spec.app.to_string(),
            chart_version: spec.version.to_string(),
            helm_registry_name: HELM_REGISTRY.to_string(),
            profiles: vec![ApplicationProfile {
                name: "default".to_string(),
                chart_values: "replicaCount: 1\n".to_string(),
                parameter_templates: spec.templates,
                deployment_requirement: spec
                    .requires
                    .iter()
                    .map(|(name, version)| DeploymentRequirement {
                        name: (*name).to_string(),
                        version: (*version).to_string(),
                        deployment_profile_name: "default".to_string(),
                    })
                    .collect(),
            }],
            ..Default::default()
        });
        self.catalog.add_package(DeploymentPackage {
            name: spec.name.to_string(),
            version: spec.version.to_string(),
            default_profile_name: "default".to_string(),
            profiles: vec![DeploymentProfile {
                name: "default".to_string(),
                display_name: "Default".to_string(),
                application_profiles: BTreeMap::from([(
                    spec.app.to_string(),
                    "default".to_string(),
                )]),
            }],
            application_references: vec![ApplicationReference {
                name: spec.app.to_string(),
                version: spec.version.to_string(),
            }],
            forbids_multiple_deployments: spec.forbids_multiple,
            ..Default::default()
        });
    }

    pub async fn create(&self, request: ApiDeployment) -> String {
        self.service
            .create_deployment(&metadata(), request)
            .await
            .expect("create should succeed")
    }
}

pub struct PackageSpec<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub app: &'a str,
    pub templates: Vec<ParameterTemplate>,
    pub requires: Vec<(&'a str, &'a str)>,
    pub forbids_multiple: bool,
}

impl<'a> PackageSpec<'a> {
    pub fn new(name: &'a str, version: &'a str, app: &'a str) -> Self {
        Self {
            name,
            version,
            app,
            templates: Vec::new(),
            requires: Vec::new(),
            forbids_multiple: false,
        }
    }
}

pub fn metadata() -> RequestMetadata {
    metadata_for_tenant(TENANT)
}

pub fn template(name: &str, mandatory: bool, secret: bool) -> ParameterTemplate {
    ParameterTemplate {
        name: name.to_string(),
        display_name: name.to_string(),
        r#type: "string".to_string(),
        mandatory,
        secret,
        ..Default::default()
    }
}

/// Auto-scaling request targeting `hello=world`
pub fn request(package: &str, version: &str, app: &str) -> ApiDeployment {
    ApiDeployment {
        app_name: package.to_string(),
        app_version: version.to_string(),
        profile_name: "default".to_string(),
        target_clusters: vec![TargetClusters {
            app_name: app.to_string(),
            labels: Some(BTreeMap::from([("hello".to_string(), "world".to_string())])),
            cluster_id: String::new(),
        }],
        ..Default::default()
    }
}
