//! # In-memory Object Store
//!
//! [`ObjectStore`] kept in process. Assigns UUIDv4 UIDs and monotonically
//! increasing resource versions, rejects stale updates with a conflict and
//! duplicate names with already-exists. Deleting a Deployment garbage
//! collects the secrets and API extensions it owns.

use super::{selector_matches, ObjectStore, Selector};
use crate::crd::{APIExtension, Cluster, Deployment, DeploymentCluster};
use crate::error::{AdmError, AdmResult};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::rbac::v1::RoleBinding;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::Resource;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug)]
struct Bucket<K> {
    items: BTreeMap<(String, String), K>,
}

impl<K> Default for Bucket<K> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }
}

impl<K> Bucket<K>
where
    K: Resource<DynamicType = ()> + Clone,
{
    fn key(ns: &str, name: &str) -> (String, String) {
        (ns.to_string(), name.to_string())
    }

    fn create(&mut self, ns: &str, obj: &K, version: u64) -> AdmResult<K> {
        let name = obj.meta().name.clone().unwrap_or_default();
        if name.is_empty() {
            return Err(AdmError::invalid(format!(
                "{}: metadata.name is required",
                K::plural(&())
            )));
        }
        let key = Self::key(ns, &name);
        if self.items.contains_key(&key) {
            return Err(AdmError::AlreadyExists(format!(
                "{} \"{}\" already exists",
                K::plural(&()),
                name
            )));
        }
        let mut stored = obj.clone();
        let meta = stored.meta_mut();
        meta.namespace = Some(ns.to_string());
        meta.uid = Some(uuid::Uuid::new_v4().to_string());
        meta.resource_version = Some(version.to_string());
        meta.creation_timestamp = now();
        self.items.insert(key, stored.clone());
        Ok(stored)
    }

    fn get(&self, ns: &str, name: &str) -> AdmResult<K> {
        self.items
            .get(&Self::key(ns, name))
            .cloned()
            .ok_or_else(|| not_found::<K>(name))
    }

    fn list(&self, ns: &str, selector: &Selector) -> Vec<K> {
        self.items
            .iter()
            .filter(|((item_ns, _), _)| ns.is_empty() || item_ns == ns)
            .filter(|(_, obj)| selector_matches(selector, obj.meta().labels.as_ref()))
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    fn update(
        &mut self,
        ns: &str,
        obj: &K,
        version: u64,
        preserve: impl Fn(&K, &mut K),
    ) -> AdmResult<K> {
        let name = obj.meta().name.clone().unwrap_or_default();
        let key = Self::key(ns, &name);
        let current = self.items.get(&key).ok_or_else(|| not_found::<K>(&name))?;
        let requested = obj.meta().resource_version.clone().unwrap_or_default();
        let actual = current.meta().resource_version.clone().unwrap_or_default();
        if !requested.is_empty() && requested != actual {
            return Err(AdmError::Conflict(format!(
                "Operation cannot be fulfilled on {} \"{}\": the object has been modified; please apply your changes to the latest version and try again",
                K::plural(&()),
                name
            )));
        }
        let mut stored = obj.clone();
        preserve(current, &mut stored);
        let meta = stored.meta_mut();
        meta.namespace = Some(ns.to_string());
        meta.uid.clone_from(&current.meta().uid);
        meta.creation_timestamp.clone_from(&current.meta().creation_timestamp);
        meta.resource_version = Some(version.to_string());
        self.items.insert(key, stored.clone());
        Ok(stored)
    }

    fn delete(&mut self, ns: &str, name: &str) -> AdmResult<K> {
        self.items
            .remove(&Self::key(ns, name))
            .ok_or_else(|| not_found::<K>(name))
    }

    fn insert(&mut self, ns: &str, mut obj: K, version: u64) -> K {
        let name = obj.meta().name.clone().unwrap_or_default();
        let meta = obj.meta_mut();
        meta.namespace = Some(ns.to_string());
        if meta.uid.is_none() {
            meta.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        meta.resource_version = Some(version.to_string());
        if meta.creation_timestamp.is_none() {
            meta.creation_timestamp = now();
        }
        self.items.insert(Self::key(ns, &name), obj.clone());
        obj
    }

    fn remove_owned_by(&mut self, ns: &str, owner_uid: &str) -> usize {
        let before = self.items.len();
        self.items.retain(|(item_ns, _), obj| {
            item_ns != ns
                || !obj
                    .meta()
                    .owner_references
                    .as_ref()
                    .is_some_and(|refs| refs.iter().any(|r| r.uid == owner_uid))
        });
        before - self.items.len()
    }
}

fn not_found<K: Resource<DynamicType = ()>>(name: &str) -> AdmError {
    AdmError::NotFound(format!("{} \"{}\" not found", K::plural(&()), name))
}

fn now() -> Option<Time> {
    let stamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    serde_json::from_value(serde_json::Value::String(stamp)).ok()
}

/// RFC 7386 JSON merge patch
pub(crate) fn merge_patch(target: &mut serde_json::Value, patch: &serde_json::Value) {
    match patch {
        serde_json::Value::Object(patch_map) => {
            if !target.is_object() {
                *target = serde_json::Value::Object(serde_json::Map::new());
            }
            if let serde_json::Value::Object(target_map) = target {
                for (key, value) in patch_map {
                    if value.is_null() {
                        target_map.remove(key);
                    } else {
                        merge_patch(
                            target_map
                                .entry(key.clone())
                                .or_insert(serde_json::Value::Null),
                            value,
                        );
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

#[derive(Debug, Default)]
struct State {
    version: u64,
    deployments: Bucket<Deployment>,
    deployment_clusters: Bucket<DeploymentCluster>,
    clusters: Bucket<Cluster>,
    api_extensions: Bucket<APIExtension>,
    secrets: Bucket<Secret>,
    namespaces: BTreeMap<String, BTreeMap<String, String>>,
    role_bindings: Vec<(String, RoleBinding)>,
}

impl State {
    fn next_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }
}

/// In-process object store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a DeploymentCluster as the external status reconciler would
    pub async fn insert_deployment_cluster(
        &self,
        ns: &str,
        dc: DeploymentCluster,
    ) -> DeploymentCluster {
        let mut state = self.state.write().await;
        let version = state.next_version();
        state.deployment_clusters.insert(ns, dc, version)
    }

    /// Seed a Cluster record
    pub async fn insert_cluster(&self, ns: &str, cluster: Cluster) -> Cluster {
        let mut state = self.state.write().await;
        let version = state.next_version();
        state.clusters.insert(ns, cluster, version)
    }

    /// Overwrite a Deployment status as the external status reconciler would
    pub async fn set_deployment_status(
        &self,
        ns: &str,
        name: &str,
        status: crate::crd::DeploymentStatus,
    ) -> AdmResult<Deployment> {
        let mut state = self.state.write().await;
        let version = state.next_version();
        let mut deployment = state.deployments.get(ns, name)?;
        deployment.status = Some(status);
        Ok(state.deployments.insert(ns, deployment, version))
    }

    /// Names of every secret in `ns`
    pub async fn secret_names(&self, ns: &str) -> Vec<String> {
        self.state
            .read()
            .await
            .secrets
            .list(ns, &Selector::new())
            .iter()
            .filter_map(|s| s.metadata.name.clone())
            .collect()
    }

    pub async fn namespace_labels(&self, ns: &str) -> Option<BTreeMap<String, String>> {
        self.state.read().await.namespaces.get(ns).cloned()
    }

    /// Role bindings with the namespace they were created in
    pub async fn role_bindings(&self) -> Vec<(String, RoleBinding)> {
        self.state.read().await.role_bindings.clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn create_deployment(&self, ns: &str, deployment: &Deployment) -> AdmResult<Deployment> {
        let mut state = self.state.write().await;
        let version = state.next_version();
        state.deployments.create(ns, deployment, version)
    }

    async fn get_deployment(&self, ns: &str, name: &str) -> AdmResult<Deployment> {
        self.state.read().await.deployments.get(ns, name)
    }

    async fn list_deployments(&self, ns: &str, selector: &Selector) -> AdmResult<Vec<Deployment>> {
        Ok(self.state.read().await.deployments.list(ns, selector))
    }

    async fn update_deployment(&self, ns: &str, deployment: &Deployment) -> AdmResult<Deployment> {
        let mut state = self.state.write().await;
        let version = state.next_version();
        // status is a subresource; a replace never touches it
        state
            .deployments
            .update(ns, deployment, version, |current, next| {
                next.status.clone_from(&current.status);
            })
    }

    async fn patch_deployment_status(
        &self,
        ns: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> AdmResult<Deployment> {
        let mut state = self.state.write().await;
        let version = state.next_version();
        let mut deployment = state.deployments.get(ns, name)?;
        let mut status = serde_json::to_value(deployment.status.clone().unwrap_or_default())?;
        merge_patch(&mut status, patch);
        deployment.status = Some(serde_json::from_value(status)?);
        deployment.metadata.resource_version = Some(version.to_string());
        state
            .deployments
            .items
            .insert((ns.to_string(), name.to_string()), deployment.clone());
        Ok(deployment)
    }

    async fn delete_deployment(&self, ns: &str, name: &str) -> AdmResult<()> {
        let mut state = self.state.write().await;
        let removed = state.deployments.delete(ns, name)?;
        if let Some(uid) = removed.metadata.uid.as_deref() {
            state.secrets.remove_owned_by(ns, uid);
            state.api_extensions.remove_owned_by(ns, uid);
        }
        Ok(())
    }

    async fn list_deployment_clusters(
        &self,
        ns: &str,
        selector: &Selector,
    ) -> AdmResult<Vec<DeploymentCluster>> {
        Ok(self.state.read().await.deployment_clusters.list(ns, selector))
    }

    async fn get_cluster(&self, ns: &str, name: &str) -> AdmResult<Cluster> {
        self.state.read().await.clusters.get(ns, name)
    }

    async fn list_clusters(&self, ns: &str, selector: &Selector) -> AdmResult<Vec<Cluster>> {
        Ok(self.state.read().await.clusters.list(ns, selector))
    }

    async fn create_api_extension(&self, ns: &str, ext: &APIExtension) -> AdmResult<APIExtension> {
        let mut state = self.state.write().await;
        let version = state.next_version();
        state.api_extensions.create(ns, ext, version)
    }

    async fn get_api_extension(&self, ns: &str, name: &str) -> AdmResult<APIExtension> {
        self.state.read().await.api_extensions.get(ns, name)
    }

    async fn list_api_extensions(
        &self,
        ns: &str,
        selector: &Selector,
    ) -> AdmResult<Vec<APIExtension>> {
        Ok(self.state.read().await.api_extensions.list(ns, selector))
    }

    async fn delete_api_extension(&self, ns: &str, name: &str) -> AdmResult<()> {
        self.state.write().await.api_extensions.delete(ns, name)?;
        Ok(())
    }

    async fn create_secret(&self, ns: &str, secret: &Secret) -> AdmResult<Secret> {
        let mut state = self.state.write().await;
        let version = state.next_version();
        state.secrets.create(ns, secret, version)
    }

    async fn get_secret(&self, ns: &str, name: &str) -> AdmResult<Secret> {
        self.state.read().await.secrets.get(ns, name)
    }

    async fn update_secret(&self, ns: &str, secret: &Secret) -> AdmResult<Secret> {
        let mut state = self.state.write().await;
        let version = state.next_version();
        state.secrets.update(ns, secret, version, |_, _| {})
    }

    async fn delete_secret(&self, ns: &str, name: &str) -> AdmResult<()> {
        self.state.write().await.secrets.delete(ns, name)?;
        Ok(())
    }

    async fn ensure_namespace(&self, ns: &str) -> AdmResult<()> {
        self.state
            .write()
            .await
            .namespaces
            .entry(ns.to_string())
            .or_default();
        Ok(())
    }

    async fn label_namespace(&self, ns: &str, labels: &BTreeMap<String, String>) -> AdmResult<()> {
        let mut state = self.state.write().await;
        let current = state
            .namespaces
            .get_mut(ns)
            .ok_or_else(|| AdmError::NotFound(format!("namespaces \"{ns}\" not found")))?;
        current.extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn create_role_binding(&self, ns: &str, binding: &RoleBinding) -> AdmResult<RoleBinding> {
        let mut state = self.state.write().await;
        let name = binding.metadata.name.clone().unwrap_or_default();
        if state
            .role_bindings
            .iter()
            .any(|(rb_ns, rb)| rb_ns == ns && rb.metadata.name.as_deref() == Some(name.as_str()))
        {
            return Err(AdmError::AlreadyExists(format!(
                "rolebindings.rbac.authorization.k8s.io \"{name}\" already exists"
            )));
        }
        state.role_bindings.push((ns.to_string(), binding.clone()));
        Ok(binding.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{DeploymentSpec, DeploymentStatus};

    fn deployment(name: &str) -> Deployment {
        let mut d = Deployment::new(name, DeploymentSpec::default());
        d.metadata.labels = Some(BTreeMap::from([("tenant".to_string(), "a".to_string())]));
        d
    }

    #[tokio::test]
    async fn test_create_assigns_uid_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let created = store.create_deployment("ns", &deployment("d1")).await.unwrap();
        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.creation_timestamp.is_some());
        let err = store.create_deployment("ns", &deployment("d1")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = MemoryStore::new();
        let created = store.create_deployment("ns", &deployment("d1")).await.unwrap();
        let updated = store.update_deployment("ns", &created).await.unwrap();
        assert_ne!(updated.metadata.resource_version, created.metadata.resource_version);
        let err = store.update_deployment("ns", &created).await.unwrap_err();
        assert_eq!(err.as_str(), "conflict");
    }

    #[tokio::test]
    async fn test_list_filters_namespace_and_selector() {
        let store = MemoryStore::new();
        store.create_deployment("ns1", &deployment("d1")).await.unwrap();
        store.create_deployment("ns2", &deployment("d2")).await.unwrap();
        let selector = Selector::from([("tenant".to_string(), "a".to_string())]);
        assert_eq!(store.list_deployments("ns1", &selector).await.unwrap().len(), 1);
        assert_eq!(store.list_deployments("", &selector).await.unwrap().len(), 2);
        let other = Selector::from([("tenant".to_string(), "b".to_string())]);
        assert!(store.list_deployments("", &other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_merge_patch_and_replace_preserves_status() {
        let store = MemoryStore::new();
        let created = store.create_deployment("ns", &deployment("d1")).await.unwrap();
        store
            .set_deployment_status("ns", "d1", DeploymentStatus {
                state: "Running".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let patched = store
            .patch_deployment_status(
                "ns",
                "d1",
                &serde_json::json!({
                    "parentDeploymentList": {
                        "p": {
                            "deploymentPackageRef": {"name": "x", "version": "1"},
                            "deploymentName": "p"
                        }
                    }
                }),
            )
            .await
            .unwrap();
        let status = patched.status.clone().unwrap();
        assert_eq!(status.state, "Running");
        assert!(status.parent_deployment_list.contains_key("p"));

        let mut replace = store.get_deployment("ns", "d1").await.unwrap();
        replace.status = None;
        let replaced = store.update_deployment("ns", &replace).await.unwrap();
        assert!(replaced.status.is_some());
        assert_eq!(replaced.metadata.uid, created.metadata.uid);

        let removed = store
            .patch_deployment_status(
                "ns",
                "d1",
                &serde_json::json!({"parentDeploymentList": {"p": null}}),
            )
            .await
            .unwrap();
        assert!(removed.status.unwrap().parent_deployment_list.is_empty());
    }

    #[test]
    fn test_merge_patch_semantics() {
        let mut target = serde_json::json!({"a": 1, "b": {"c": 2, "d": 3}});
        merge_patch(&mut target, &serde_json::json!({"a": null, "b": {"c": 5}, "e": [1]}));
        assert_eq!(target, serde_json::json!({"b": {"c": 5, "d": 3}, "e": [1]}));
    }
}
