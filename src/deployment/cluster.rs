//! # Cluster Views
//!
//! Read operations keyed by edge cluster. DeploymentCluster records are
//! produced by the fleet reconciler and only read here.

use super::model::{
    ClusterDetail, ClusterInfo, DeploymentInstancesCluster, DeploymentStatusView,
    ListClustersResponse, ListDeploymentClustersResponse, ListDeploymentsPerClusterResponse,
    ListRequest, State, SummaryView,
};
use super::read::{
    app_views, cluster_state_view, cluster_view, create_time, deployment_id_label,
    matches_labels, total_elements,
};
use super::{incomplete_request, observe, DeploymentService};
use crate::constants::{
    MAX_CLUSTERS_RESPONSE, MAX_DEPLOYMENTS_RESPONSE, MAX_LABELS_PER_REQUEST_CLUSTERS,
    MAX_LABELS_PER_REQUEST_DEPLOYMENTS,
};
use crate::crd::{Cluster, DeploymentCluster};
use crate::error::{AdmError, AdmResult};
use crate::labels::{tenant_selector, CLUSTER_NAME, DEPLOYMENT_ID};
use crate::query::{matches_label_filters, Query};
use crate::tenant::{require_tenant, RequestMetadata};
use crate::validation::{validate_id, validate_labels};
use serde_json::json;
use tracing::{debug, info_span, Instrument};

fn missing_cluster_id() -> AdmError {
    AdmError::invalid("incomplete request - cluster ID is missing")
}

/// Sum the per-deployment summaries of one cluster; any non-running state wins
fn rollup(cluster_id: &str, name: String, records: &[DeploymentCluster]) -> ClusterDetail {
    let mut status = DeploymentStatusView {
        state: State::Running,
        message: String::new(),
        summary: SummaryView::default(),
    };
    let mut apps = Vec::new();
    for dc in records {
        let view = cluster_state_view(&dc.status.clone().unwrap_or_default().status);
        status.summary.total = status.summary.total.saturating_add(view.summary.total);
        status.summary.running = status.summary.running.saturating_add(view.summary.running);
        status.summary.down = status.summary.down.saturating_add(view.summary.down);
        status.summary.unknown = status.summary.unknown.saturating_add(view.summary.unknown);
        if status.summary.r#type.is_empty() {
            status.summary.r#type = view.summary.r#type;
        }
        if view.state != State::Running {
            status.state = view.state;
            status.message = view.message;
        }
        apps.extend(app_views(dc));
    }
    ClusterDetail {
        id: cluster_id.to_string(),
        name,
        status,
        apps,
    }
}

impl DeploymentService {
    /// DeploymentCluster records of the tenant carrying the given label
    async fn tenant_deployment_clusters(
        &self,
        tenant: &str,
        key: &str,
        value: &str,
    ) -> AdmResult<Vec<DeploymentCluster>> {
        let mut selector = tenant_selector(tenant);
        selector.insert(key.to_string(), value.to_string());
        self.store.list_deployment_clusters("", &selector).await
    }

    /// Clusters a deployment runs on
    pub async fn list_deployment_clusters(
        &self,
        metadata: &RequestMetadata,
        deployment_id: &str,
        request: &ListRequest,
    ) -> AdmResult<ListDeploymentClustersResponse> {
        let span = info_span!("adm.list_deployment_clusters", deployment.id = %deployment_id);
        observe("ListDeploymentClusters", async move {
            if deployment_id.is_empty() {
                return Err(incomplete_request());
            }
            validate_id("depl_id", deployment_id)?;
            let query = Query::parse(
                &request.order_by,
                &request.filter,
                request.page_size,
                request.offset,
            )
            .map_err(|e| {
                AdmError::invalid(format!(
                    "cannot list clusters for given deployment: {deployment_id}, {}",
                    e.message()
                ))
            })?;
            self.authorize(
                "ListDeploymentClusters",
                &json!({ "deplId": deployment_id, "request": request }),
                metadata,
                "cannot get deployment clusters",
            )
            .await?;
            let tenant = require_tenant(metadata)?;

            if self.find_by_uid(&tenant, deployment_id).await?.is_none() {
                return Err(AdmError::NotFound(format!(
                    "deployment id {deployment_id} not found"
                )));
            }
            let clusters: Vec<_> = self
                .tenant_deployment_clusters(&tenant, DEPLOYMENT_ID, deployment_id)
                .await?
                .iter()
                .filter(|dc| deployment_id_label(dc) == Some(deployment_id))
                .map(cluster_view)
                .collect();

            let (mut selected, matched) = query.select_counted(clusters);
            selected.truncate(MAX_CLUSTERS_RESPONSE);
            Ok(ListDeploymentClustersResponse {
                clusters: selected,
                total_elements: total_elements(matched, MAX_CLUSTERS_RESPONSE),
            })
        })
        .instrument(span)
        .await
    }

    /// Deployments running on one cluster, each with that cluster's status
    pub async fn list_deployments_per_cluster(
        &self,
        metadata: &RequestMetadata,
        cluster_id: &str,
        request: &ListRequest,
    ) -> AdmResult<ListDeploymentsPerClusterResponse> {
        let span = info_span!("adm.list_deployments_per_cluster", cluster.id = %cluster_id);
        observe("ListDeploymentsPerCluster", async move {
            if cluster_id.is_empty() {
                return Err(missing_cluster_id());
            }
            validate_id("cluster_id", cluster_id)?;
            validate_labels(&request.labels, MAX_LABELS_PER_REQUEST_DEPLOYMENTS)?;
            let query = Query::parse(
                &request.order_by,
                &request.filter,
                request.page_size,
                request.offset,
            )?;
            self.authorize(
                "ListDeploymentsPerCluster",
                &json!({ "clusterId": cluster_id, "request": request }),
                metadata,
                "cannot list deployments per cluster",
            )
            .await?;
            let tenant = require_tenant(metadata)?;

            let deployments = self
                .store
                .list_deployments(&tenant, &tenant_selector(&tenant))
                .await?;
            let records = self
                .tenant_deployment_clusters(&tenant, CLUSTER_NAME, cluster_id)
                .await?;

            let mut instances = Vec::new();
            for dc in &records {
                let Some(uid) = deployment_id_label(dc) else {
                    debug!(record = ?dc.metadata.name, "DeploymentCluster without deployment id");
                    continue;
                };
                let Some(deployment) = deployments.iter().find(|d| d.uid() == uid) else {
                    continue;
                };
                if !matches_labels(deployment, &request.labels) {
                    continue;
                }
                let status = dc.status.clone().unwrap_or_default();
                instances.push(DeploymentInstancesCluster {
                    deployment_uid: uid.to_string(),
                    deployment_name: deployment.name().to_string(),
                    deployment_display_name: deployment.spec.display_name.clone(),
                    status: cluster_state_view(&status.status),
                    apps: app_views(dc),
                });
            }

            let (mut selected, matched) = query.select_counted(instances);
            selected.truncate(MAX_DEPLOYMENTS_RESPONSE);
            Ok(ListDeploymentsPerClusterResponse {
                deployment_instances_cluster: selected,
                total_elements: total_elements(matched, MAX_DEPLOYMENTS_RESPONSE),
            })
        })
        .instrument(span)
        .await
    }

    /// Clusters of the tenant matching the label filters
    pub async fn list_clusters(
        &self,
        metadata: &RequestMetadata,
        request: &ListRequest,
    ) -> AdmResult<ListClustersResponse> {
        let span = info_span!("adm.list_clusters", labels = ?request.labels);
        observe("ListClusters", async move {
            validate_labels(&request.labels, MAX_LABELS_PER_REQUEST_CLUSTERS)?;
            let query = Query::parse(
                &request.order_by,
                &request.filter,
                request.page_size,
                request.offset,
            )?;
            self.authorize("ListClusters", request, metadata, "cannot list clusters")
                .await?;
            let tenant = require_tenant(metadata)?;

            let clusters: Vec<ClusterInfo> = self
                .store
                .list_clusters(&tenant, &tenant_selector(&tenant))
                .await?
                .into_iter()
                .filter_map(|cluster| {
                    let labels = cluster.metadata.labels.clone().unwrap_or_default();
                    if !matches_label_filters(&request.labels, std::iter::once(&labels)) {
                        return None;
                    }
                    Some(ClusterInfo {
                        id: cluster.metadata.name.clone().unwrap_or_default(),
                        name: cluster.spec.display_name.clone(),
                        create_time: create_time(&cluster.metadata),
                        labels,
                    })
                })
                .collect();

            let (mut selected, matched) = query.select_counted(clusters);
            selected.truncate(MAX_CLUSTERS_RESPONSE);
            Ok(ListClustersResponse {
                clusters: selected,
                total_elements: total_elements(matched, MAX_CLUSTERS_RESPONSE),
            })
        })
        .instrument(span)
        .await
    }

    /// One cluster with the status of every deployment on it
    pub async fn get_cluster(
        &self,
        metadata: &RequestMetadata,
        cluster_id: &str,
    ) -> AdmResult<ClusterDetail> {
        let span = info_span!("adm.get_cluster", cluster.id = %cluster_id);
        observe("GetCluster", async move {
            if cluster_id.is_empty() {
                return Err(missing_cluster_id());
            }
            validate_id("cluster_id", cluster_id)?;
            self.authorize(
                "GetCluster",
                &json!({ "clusterId": cluster_id }),
                metadata,
                "cannot get cluster",
            )
            .await?;
            let tenant = require_tenant(metadata)?;

            let cluster = self.cluster_record(&tenant, cluster_id).await?;
            let records = self
                .tenant_deployment_clusters(&tenant, CLUSTER_NAME, cluster_id)
                .await?;
            let name = if cluster.spec.display_name.is_empty() {
                cluster_id.to_string()
            } else {
                cluster.spec.display_name.clone()
            };
            Ok(rollup(cluster_id, name, &records))
        })
        .instrument(span)
        .await
    }

    async fn cluster_record(&self, tenant: &str, cluster_id: &str) -> AdmResult<Cluster> {
        self.store
            .get_cluster(tenant, cluster_id)
            .await
            .map_err(|e| match e {
                AdmError::NotFound(_) => {
                    AdmError::NotFound(format!("cluster id {cluster_id} not found"))
                }
                other => other,
            })
    }

    /// Raw kubeconfig of a cluster
    pub async fn get_kube_config(
        &self,
        metadata: &RequestMetadata,
        cluster_id: &str,
    ) -> AdmResult<Vec<u8>> {
        let span = info_span!("adm.get_kube_config", cluster.id = %cluster_id);
        observe("GetKubeConfig", async move {
            if cluster_id.is_empty() {
                return Err(missing_cluster_id());
            }
            validate_id("cluster_id", cluster_id)?;
            self.authorize(
                "GetKubeConfig",
                &json!({ "clusterId": cluster_id }),
                metadata,
                "cannot get kubeConfig info",
            )
            .await?;
            let tenant = require_tenant(metadata)?;

            let cluster = self.cluster_record(&tenant, cluster_id).await?;
            let secret_name = &cluster.spec.kube_config_secret_name;
            if secret_name.is_empty() {
                return Err(AdmError::NotFound(format!(
                    "cluster {cluster_id} has no kubeconfig secret"
                )));
            }
            let secret = self.store.get_secret(&tenant, secret_name).await?;
            secret
                .data
                .as_ref()
                .and_then(|data| data.get("value"))
                .map(|value| value.0.clone())
                .ok_or_else(|| {
                    AdmError::NotFound(format!("kubeconfig of cluster {cluster_id} not found"))
                })
        })
        .instrument(span)
        .await
    }

    /// Target namespace of the application a fleet bundle id belongs to
    pub async fn get_app_namespace(
        &self,
        metadata: &RequestMetadata,
        app_id: &str,
    ) -> AdmResult<String> {
        let span = info_span!("adm.get_app_namespace", app.id = %app_id);
        observe("GetAppNamespace", async move {
            if app_id.is_empty() {
                return Err(incomplete_request());
            }
            self.authorize(
                "GetAppNamespace",
                &json!({ "appId": app_id }),
                metadata,
                "cannot get app namespace",
            )
            .await?;
            let tenant = require_tenant(metadata)?;
            let not_found = || AdmError::NotFound(format!("application {app_id} not found"));

            let records = self
                .store
                .list_deployment_clusters("", &tenant_selector(&tenant))
                .await?;
            let Some((uid, app_name)) = records.iter().find_map(|dc| {
                let app = dc.status.as_ref()?.apps.iter().find(|a| a.id == app_id)?;
                Some((deployment_id_label(dc)?.to_string(), app.name.clone()))
            }) else {
                return Err(not_found());
            };
            let deployment = self.find_by_uid(&tenant, &uid).await?.ok_or_else(not_found)?;
            deployment
                .spec
                .applications
                .iter()
                .find(|a| a.name == app_name)
                .map(|a| a.namespace.clone())
                .ok_or_else(not_found)
        })
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ClusterState, ClusterSummary, DeploymentClusterSpec, DeploymentClusterStatus};

    fn record(state: &str, total: i32, running: i32, down: i32) -> DeploymentCluster {
        let mut dc = DeploymentCluster::new(
            "dc",
            DeploymentClusterSpec {
                cluster_id: "cluster-1".to_string(),
                ..Default::default()
            },
        );
        dc.status = Some(DeploymentClusterStatus {
            status: ClusterState {
                state: state.to_string(),
                message: format!("{state} message"),
                summary: ClusterSummary {
                    r#type: "deployment".to_string(),
                    total,
                    running,
                    down,
                    unknown: 0,
                },
            },
            ..Default::default()
        });
        dc
    }

    #[test]
    fn test_rollup_sums_and_overrides_state() {
        let detail = rollup(
            "cluster-1",
            "edge".to_string(),
            &[record("Running", 2, 2, 0), record("Down", 3, 1, 2)],
        );
        assert_eq!(detail.status.state, State::Down);
        assert_eq!(detail.status.message, "Down message");
        assert_eq!(detail.status.summary.total, 5);
        assert_eq!(detail.status.summary.running, 3);
        assert_eq!(detail.status.summary.down, 2);
        assert_eq!(detail.status.summary.r#type, "deployment");
    }

    #[test]
    fn test_rollup_without_records_is_running() {
        let detail = rollup("cluster-1", "edge".to_string(), &[]);
        assert_eq!(detail.status.state, State::Running);
        assert_eq!(detail.status.summary.total, 0);
        assert!(detail.apps.is_empty());
    }
}
