//! # Static Catalog
//!
//! In-memory [`CatalogClient`] for tests and `--in-memory` development runs.

use super::{Artifact, CatalogApplication, CatalogClient, DeploymentPackage, Registry};
use crate::error::{AdmError, AdmResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
struct Contents {
    packages: BTreeMap<(String, String), DeploymentPackage>,
    applications: BTreeMap<(String, String), CatalogApplication>,
    registries: BTreeMap<String, Registry>,
    artifacts: Vec<Artifact>,
    updates: usize,
}

/// Catalog served from memory
#[derive(Debug, Default)]
pub struct StaticCatalog {
    contents: RwLock<Contents>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a package
    pub fn add_package(&self, package: DeploymentPackage) {
        let key = (package.name.clone(), package.version.clone());
        self.write().packages.insert(key, package);
    }

    /// Add or replace an application
    pub fn add_application(&self, app: CatalogApplication) {
        let key = (app.name.clone(), app.version.clone());
        self.write().applications.insert(key, app);
    }

    pub fn add_registry(&self, registry: Registry) {
        self.write().registries.insert(registry.name.clone(), registry);
    }

    pub fn add_artifact(&self, artifact: Artifact) {
        self.write().artifacts.push(artifact);
    }

    pub fn package(&self, name: &str, version: &str) -> Option<DeploymentPackage> {
        self.read()
            .packages
            .get(&(name.to_string(), version.to_string()))
            .cloned()
    }

    pub fn application(&self, name: &str, version: &str) -> Option<CatalogApplication> {
        self.read()
            .applications
            .get(&(name.to_string(), version.to_string()))
            .cloned()
    }

    /// Number of package updates received
    pub fn update_count(&self) -> usize {
        self.read().updates
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Contents> {
        self.contents.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Contents> {
        self.contents.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CatalogClient for StaticCatalog {
    async fn get_deployment_package(
        &self,
        name: &str,
        version: &str,
    ) -> AdmResult<DeploymentPackage> {
        self.package(name, version).ok_or_else(|| {
            AdmError::not_found(format!("deployment package {name}:{version} not found"))
        })
    }

    async fn update_deployment_package(&self, package: &DeploymentPackage) -> AdmResult<()> {
        let mut contents = self.write();
        let key = (package.name.clone(), package.version.clone());
        if !contents.packages.contains_key(&key) {
            return Err(AdmError::not_found(format!(
                "deployment package {}:{} not found",
                package.name, package.version
            )));
        }
        contents.packages.insert(key, package.clone());
        contents.updates += 1;
        Ok(())
    }

    async fn get_application(&self, name: &str, version: &str) -> AdmResult<CatalogApplication> {
        self.application(name, version).ok_or_else(|| {
            AdmError::not_found(format!("application {name}:{version} not found"))
        })
    }

    async fn get_registry(&self, name: &str, show_sensitive: bool) -> AdmResult<Registry> {
        let mut registry = self
            .read()
            .registries
            .get(name)
            .cloned()
            .ok_or_else(|| AdmError::not_found(format!("registry {name} not found")))?;
        if !show_sensitive {
            registry.auth_token.clear();
            registry.cacerts.clear();
        }
        Ok(registry)
    }

    async fn list_artifacts(&self) -> AdmResult<Vec<Artifact>> {
        Ok(self.read().artifacts.clone())
    }
}
