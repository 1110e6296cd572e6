//! # Read Paths
//!
//! GetDeployment and ListDeployments, plus the record to API view
//! conversions shared with the cluster operations.

use super::model::{
    ApiDeployment, App, Cluster, DeploymentStatusView, ListDeploymentsResponse, ListRequest,
    OverrideValues, State, SummaryView,
};
use super::secrets::secret_value;
use super::targets::target_view;
use super::{incomplete_request, observe, DeploymentService};
use crate::constants::{
    MAX_DEPLOYMENTS_RESPONSE, MAX_LABELS_PER_REQUEST_DEPLOYMENTS, SUMMARY_TYPE_CLUSTER_COUNTS,
};
use crate::crd::{ClusterState, Deployment, DeploymentCluster, DeploymentStatus};
use crate::error::{AdmError, AdmResult};
use crate::labels::{tenant_selector, DEPLOYMENT_ID};
use crate::observability::metrics;
use crate::query::{matches_label_filters, Query};
use crate::tenant::{require_tenant, RequestMetadata};
use crate::validation::{validate_id, validate_labels};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::json;
use tracing::{debug, info_span, warn, Instrument};

/// Deployment status as reported by the status reconciler
pub(super) fn status_view(status: Option<&DeploymentStatus>) -> DeploymentStatusView {
    let Some(status) = status else {
        return DeploymentStatusView {
            summary: SummaryView {
                r#type: SUMMARY_TYPE_CLUSTER_COUNTS.to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
    };
    DeploymentStatusView {
        state: State::from_raw(&status.state),
        message: status.message.clone(),
        summary: SummaryView {
            total: status.summary.total,
            running: status.summary.running,
            down: status.summary.down,
            unknown: status.summary.unknown,
            r#type: SUMMARY_TYPE_CLUSTER_COUNTS.to_string(),
        },
    }
}

pub(super) fn cluster_state_view(state: &ClusterState) -> DeploymentStatusView {
    DeploymentStatusView {
        state: State::from_raw(&state.state),
        message: state.message.clone(),
        summary: SummaryView {
            total: state.summary.total,
            running: state.summary.running,
            down: state.summary.down,
            unknown: state.summary.unknown,
            r#type: state.summary.r#type.clone(),
        },
    }
}

/// Applications reported on one cluster
pub(super) fn app_views(dc: &DeploymentCluster) -> Vec<App> {
    dc.status
        .iter()
        .flat_map(|s| &s.apps)
        .map(|app| App {
            id: app.id.clone(),
            name: app.name.clone(),
            status: cluster_state_view(&app.status),
        })
        .collect()
}

pub(super) fn cluster_view(dc: &DeploymentCluster) -> Cluster {
    let status = dc.status.clone().unwrap_or_default();
    Cluster {
        id: dc.cluster_id().to_string(),
        name: status.name.clone(),
        status: cluster_state_view(&status.status),
        apps: app_views(dc),
    }
}

/// Creation timestamp in RFC 3339
pub(super) fn create_time(meta: &ObjectMeta) -> Option<String> {
    let stamp = serde_json::to_value(meta.creation_timestamp.as_ref()?).ok()?;
    stamp.as_str().map(str::to_string)
}

pub(super) fn deployment_id_label(dc: &DeploymentCluster) -> Option<&str> {
    dc.metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(DEPLOYMENT_ID))
        .map(String::as_str)
}

/// `totalElements` of a List response, capped like the response array
pub(super) fn total_elements(matched: usize, cap: usize) -> i32 {
    i32::try_from(matched.min(cap)).unwrap_or(i32::MAX)
}

/// Whether any target of any application matches the label filters
pub(super) fn matches_labels(deployment: &Deployment, labels: &[String]) -> bool {
    matches_label_filters(
        labels,
        deployment.spec.applications.iter().flat_map(|a| &a.targets),
    )
}

impl DeploymentService {
    /// Overrides of every application, masked where the app has secret parameters
    async fn override_views(&self, deployment: &Deployment) -> Vec<OverrideValues> {
        let ns = deployment.metadata.namespace.as_deref().unwrap_or_default();
        let mut views = Vec::new();
        for app in &deployment.spec.applications {
            if app.value_secret_name.is_empty() {
                continue;
            }
            let masked = format!("{}-masked", app.value_secret_name);
            let secret = match self.store.get_secret(ns, &masked).await {
                Ok(secret) => secret,
                Err(e) if e.is_not_found() => {
                    match self.store.get_secret(ns, &app.value_secret_name).await {
                        Ok(secret) => secret,
                        Err(e) => {
                            warn!(secret = %app.value_secret_name, error = %e, "cannot get secret");
                            continue;
                        }
                    }
                }
                Err(e) => {
                    warn!(secret = %masked, error = %e, "cannot get secret");
                    continue;
                }
            };
            let Some(raw) = secret_value(&secret, "values") else {
                continue;
            };
            let values: serde_json::Value = match serde_yaml::from_str(&raw) {
                Ok(values) => values,
                Err(e) => {
                    warn!(application = %app.name, error = %e, "cannot convert values to JSON");
                    continue;
                }
            };
            views.push(OverrideValues {
                app_name: app.name.clone(),
                target_namespace: app.namespace.clone(),
                values: values.as_object().cloned(),
            });
        }
        views
    }

    /// API view of a record; `tenant_deployments` resolves child names to UIDs
    pub(super) async fn deployment_view(
        &self,
        deployment: &Deployment,
        clusters: &[DeploymentCluster],
        tenant_deployments: &[Deployment],
    ) -> ApiDeployment {
        let package = &deployment.spec.deployment_package_ref;
        let target_clusters = deployment
            .spec
            .applications
            .iter()
            .flat_map(|app| app.targets.iter().map(|t| target_view(&app.name, t)))
            .collect();
        let child_deployment_ids = deployment
            .spec
            .child_deployment_list
            .keys()
            .filter_map(|child| tenant_deployments.iter().find(|d| d.name() == child))
            .map(|d| d.uid().to_string())
            .collect();

        ApiDeployment {
            name: deployment.name().to_string(),
            display_name: deployment.spec.display_name.clone(),
            app_name: package.name.clone(),
            app_version: package.version.clone(),
            profile_name: package.profile_name.clone(),
            deploy_id: deployment.uid().to_string(),
            deployment_type: deployment.spec.deployment_type.as_str().to_string(),
            network_name: deployment
                .spec
                .network_ref
                .as_ref()
                .map(|n| n.name.clone())
                .unwrap_or_default(),
            override_values: self.override_views(deployment).await,
            target_clusters,
            all_app_target_clusters: None,
            status: Some(status_view(deployment.status.as_ref())),
            apps: clusters.iter().flat_map(app_views).collect(),
            create_time: create_time(&deployment.metadata),
            default_profile_name: String::new(),
            child_deployment_ids,
        }
    }

    /// Tenant deployment by UID with the apps its DeploymentClusters report
    pub(super) async fn deployment_detail(
        &self,
        tenant: &str,
        deployment_id: &str,
    ) -> AdmResult<ApiDeployment> {
        let all = self
            .store
            .list_deployments(tenant, &tenant_selector(tenant))
            .await?;
        let Some(deployment) = all.iter().find(|d| d.uid() == deployment_id) else {
            return Err(AdmError::NotFound(format!(
                "deployment id {deployment_id} not found"
            )));
        };

        let mut selector = tenant_selector(tenant);
        selector.insert(DEPLOYMENT_ID.to_string(), deployment_id.to_string());
        let clusters: Vec<DeploymentCluster> = self
            .store
            .list_deployment_clusters("", &selector)
            .await?
            .into_iter()
            .filter(|dc| {
                let matches = deployment_id_label(dc) == Some(deployment_id);
                if !matches {
                    warn!(
                        cluster = ?dc.metadata.name,
                        "skipping DeploymentCluster with mismatched deployment id"
                    );
                }
                matches
            })
            .collect();

        Ok(self.deployment_view(deployment, &clusters, &all).await)
    }

    /// Deployment with its per-cluster applications
    pub async fn get_deployment(
        &self,
        metadata: &RequestMetadata,
        deployment_id: &str,
    ) -> AdmResult<ApiDeployment> {
        let span = info_span!("adm.get_deployment", deployment.id = %deployment_id);
        observe("GetDeployment", async move {
            if deployment_id.is_empty() {
                return Err(incomplete_request());
            }
            validate_id("depl_id", deployment_id)?;
            self.authorize(
                "GetDeployment",
                &json!({ "deplId": deployment_id }),
                metadata,
                "cannot get deployment",
            )
            .await?;
            let tenant = require_tenant(metadata)?;

            self.deployment_detail(&tenant, deployment_id).await
        })
        .instrument(span)
        .await
    }

    /// Deployments of the tenant matching the label filters, then filtered, sorted and paged
    pub async fn list_deployments(
        &self,
        metadata: &RequestMetadata,
        request: &ListRequest,
    ) -> AdmResult<ListDeploymentsResponse> {
        let span = info_span!("adm.list_deployments", labels = ?request.labels);
        observe("ListDeployments", async move {
            validate_labels(&request.labels, MAX_LABELS_PER_REQUEST_DEPLOYMENTS)?;
            let query = Query::parse(
                &request.order_by,
                &request.filter,
                request.page_size,
                request.offset,
            )?;
            self.authorize("ListDeployments", request, metadata, "cannot list deployments")
                .await?;
            let tenant = require_tenant(metadata)?;

            let deployments = self
                .store
                .list_deployments(&tenant, &tenant_selector(&tenant))
                .await?;
            metrics::set_deployments_managed(deployments.len());

            let mut views = Vec::new();
            for deployment in deployments.iter().filter(|d| matches_labels(d, &request.labels)) {
                views.push(self.deployment_view(deployment, &[], &deployments).await);
            }
            let (mut selected, matched) = query.select_counted(views);
            selected.truncate(MAX_DEPLOYMENTS_RESPONSE);
            debug!(matched, returned = selected.len(), "Listed deployments");

            Ok(ListDeploymentsResponse {
                deployments: selected,
                total_elements: total_elements(matched, MAX_DEPLOYMENTS_RESPONSE),
            })
        })
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{
        AppStatus, ClusterSummary, DeploymentClusterSpec, DeploymentClusterStatus, Summary,
    };

    #[test]
    fn test_status_view_projects_state() {
        let status = DeploymentStatus {
            state: "Running".to_string(),
            message: "ok".to_string(),
            summary: Summary {
                total: 2,
                running: 2,
                down: 0,
                unknown: 0,
            },
            ..Default::default()
        };
        let view = status_view(Some(&status));
        assert_eq!(view.state, State::Running);
        assert_eq!(view.summary.total, 2);
        assert_eq!(view.summary.r#type, SUMMARY_TYPE_CLUSTER_COUNTS);
        assert_eq!(status_view(None).state, State::Deploying);
    }

    #[test]
    fn test_cluster_view() {
        let mut dc = DeploymentCluster::new(
            "dc-1",
            DeploymentClusterSpec {
                deployment_id: "uid-1".to_string(),
                cluster_id: "cluster-1".to_string(),
                namespace: "t".to_string(),
            },
        );
        dc.status = Some(DeploymentClusterStatus {
            name: "edge one".to_string(),
            status: ClusterState {
                state: "Down".to_string(),
                summary: ClusterSummary {
                    total: 2,
                    down: 1,
                    running: 1,
                    ..Default::default()
                },
                ..Default::default()
            },
            apps: vec![AppStatus {
                name: "wordpress".to_string(),
                id: "b-1".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        let view = cluster_view(&dc);
        assert_eq!(view.id, "cluster-1");
        assert_eq!(view.name, "edge one");
        assert_eq!(view.status.state, State::Down);
        assert_eq!(view.apps.len(), 1);
        assert_eq!(view.apps[0].status.state, State::Deploying);
    }
}
