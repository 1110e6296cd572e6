//! # Kubernetes Object Store
//!
//! [`ObjectStore`] backed by the Kubernetes API server.

use super::{selector_string, ObjectStore, Selector};
use crate::constants::FIELD_MANAGER;
use crate::crd::{APIExtension, Cluster, Deployment, DeploymentCluster};
use crate::error::AdmResult;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::api::rbac::v1::RoleBinding;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::debug;

/// Object store talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, ns: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        if ns.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), ns)
        }
    }

    async fn create<K>(&self, ns: &str, obj: &K) -> AdmResult<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        Ok(self.api::<K>(ns).create(&PostParams::default(), obj).await?)
    }

    async fn get<K>(&self, ns: &str, name: &str) -> AdmResult<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        Ok(self.api::<K>(ns).get(name).await?)
    }

    async fn list<K>(&self, ns: &str, selector: &Selector) -> AdmResult<Vec<K>>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector_string(selector));
        }
        Ok(self.api::<K>(ns).list(&params).await?.items)
    }

    async fn replace<K>(&self, ns: &str, obj: &K) -> AdmResult<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let name = obj.meta().name.clone().unwrap_or_default();
        Ok(self
            .api::<K>(ns)
            .replace(&name, &PostParams::default(), obj)
            .await?)
    }

    async fn delete<K>(&self, ns: &str, name: &str) -> AdmResult<()>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        self.api::<K>(ns)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn create_deployment(&self, ns: &str, deployment: &Deployment) -> AdmResult<Deployment> {
        self.create(ns, deployment).await
    }

    async fn get_deployment(&self, ns: &str, name: &str) -> AdmResult<Deployment> {
        self.get(ns, name).await
    }

    async fn list_deployments(&self, ns: &str, selector: &Selector) -> AdmResult<Vec<Deployment>> {
        self.list(ns, selector).await
    }

    async fn update_deployment(&self, ns: &str, deployment: &Deployment) -> AdmResult<Deployment> {
        self.replace(ns, deployment).await
    }

    async fn patch_deployment_status(
        &self,
        ns: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> AdmResult<Deployment> {
        let status_patch = serde_json::json!({ "status": patch });
        let api: Api<Deployment> = self.api(ns);
        Ok(api
            .patch_status(
                name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&status_patch),
            )
            .await?)
    }

    async fn delete_deployment(&self, ns: &str, name: &str) -> AdmResult<()> {
        self.delete::<Deployment>(ns, name).await
    }

    async fn list_deployment_clusters(
        &self,
        ns: &str,
        selector: &Selector,
    ) -> AdmResult<Vec<DeploymentCluster>> {
        self.list(ns, selector).await
    }

    async fn get_cluster(&self, ns: &str, name: &str) -> AdmResult<Cluster> {
        self.get(ns, name).await
    }

    async fn list_clusters(&self, ns: &str, selector: &Selector) -> AdmResult<Vec<Cluster>> {
        self.list(ns, selector).await
    }

    async fn create_api_extension(&self, ns: &str, ext: &APIExtension) -> AdmResult<APIExtension> {
        self.create(ns, ext).await
    }

    async fn get_api_extension(&self, ns: &str, name: &str) -> AdmResult<APIExtension> {
        self.get(ns, name).await
    }

    async fn list_api_extensions(
        &self,
        ns: &str,
        selector: &Selector,
    ) -> AdmResult<Vec<APIExtension>> {
        self.list(ns, selector).await
    }

    async fn delete_api_extension(&self, ns: &str, name: &str) -> AdmResult<()> {
        self.delete::<APIExtension>(ns, name).await
    }

    async fn create_secret(&self, ns: &str, secret: &Secret) -> AdmResult<Secret> {
        self.create(ns, secret).await
    }

    async fn get_secret(&self, ns: &str, name: &str) -> AdmResult<Secret> {
        self.get(ns, name).await
    }

    async fn update_secret(&self, ns: &str, secret: &Secret) -> AdmResult<Secret> {
        self.replace(ns, secret).await
    }

    async fn delete_secret(&self, ns: &str, name: &str) -> AdmResult<()> {
        self.delete::<Secret>(ns, name).await
    }

    async fn ensure_namespace(&self, ns: &str) -> AdmResult<()> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        match namespaces.get(ns).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(namespace = ns, "Creating tenant namespace");
                let namespace = Namespace {
                    metadata: ObjectMeta {
                        name: Some(ns.to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                };
                match namespaces.create(&PostParams::default(), &namespace).await {
                    Ok(_) => Ok(()),
                    Err(kube::Error::Api(api_err)) if api_err.code == 409 => Ok(()),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn label_namespace(&self, ns: &str, labels: &BTreeMap<String, String>) -> AdmResult<()> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let patch = serde_json::json!({ "metadata": { "labels": labels } });
        namespaces
            .patch(ns, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn create_role_binding(&self, ns: &str, binding: &RoleBinding) -> AdmResult<RoleBinding> {
        self.create(ns, binding).await
    }
}
