//! Cluster-keyed reads over DeploymentCluster and Cluster records seeded
//! the way the fleet reconciler writes them.

mod common;

use app_deployment_manager::crd::{
    AppStatus, Cluster, ClusterSpec, ClusterState, ClusterSummary, DeploymentCluster,
    DeploymentClusterSpec, DeploymentClusterStatus,
};
use app_deployment_manager::deployment::{ApiDeployment, ListRequest, OverrideValues, State};
use app_deployment_manager::error::AdmError;
use app_deployment_manager::labels::{CLUSTER_NAME, DEPLOYMENT_ID, TENANT as TENANT_LABEL};
use app_deployment_manager::store::ObjectStore;
use common::{metadata, request, Harness, PackageSpec, TENANT};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;

fn summary(total: i32, running: i32, down: i32) -> ClusterSummary {
    ClusterSummary {
        r#type: "deployment".to_string(),
        total,
        running,
        down,
        unknown: 0,
    }
}

fn state(raw: &str, total: i32, running: i32, down: i32) -> ClusterState {
    ClusterState {
        state: raw.to_string(),
        message: String::new(),
        summary: summary(total, running, down),
    }
}

async fn seed_record(
    harness: &Harness,
    deployment_id: &str,
    cluster_id: &str,
    raw_state: &str,
    apps: Vec<AppStatus>,
) {
    let mut dc = DeploymentCluster::new(
        &format!("dc-{cluster_id}-{}", &deployment_id[..8]),
        DeploymentClusterSpec {
            deployment_id: deployment_id.to_string(),
            cluster_id: cluster_id.to_string(),
            namespace: TENANT.to_string(),
        },
    );
    dc.metadata.labels = Some(BTreeMap::from([
        (TENANT_LABEL.to_string(), TENANT.to_string()),
        (DEPLOYMENT_ID.to_string(), deployment_id.to_string()),
        (CLUSTER_NAME.to_string(), cluster_id.to_string()),
    ]));
    let running = i32::from(raw_state == "Running");
    dc.status = Some(DeploymentClusterStatus {
        name: format!("{cluster_id} display"),
        status: state(raw_state, 1, running, 1 - running),
        apps,
        ..Default::default()
    });
    harness.store.insert_deployment_cluster(TENANT, dc).await;
}

async fn seed_cluster(harness: &Harness, id: &str, labels: &[(&str, &str)]) {
    let mut cluster = Cluster::new(
        id,
        ClusterSpec {
            name: id.to_string(),
            display_name: format!("{id} display"),
            kube_config_secret_name: format!("{id}-kubeconfig"),
        },
    );
    let mut all_labels: BTreeMap<String, String> = labels
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    all_labels.insert(TENANT_LABEL.to_string(), TENANT.to_string());
    cluster.metadata.labels = Some(all_labels);
    harness.store.insert_cluster(TENANT, cluster).await;
}

fn wordpress_app(id: &str, raw_state: &str) -> AppStatus {
    AppStatus {
        name: "wordpress".to_string(),
        id: id.to_string(),
        deployment_generation: 1,
        status: state(raw_state, 1, 1, 0),
    }
}

async fn wordpress_deployment(harness: &Harness) -> String {
    harness.add_package(PackageSpec::new("wp", "0.1.0", "wordpress"));
    harness
        .create(ApiDeployment {
            override_values: vec![OverrideValues {
                app_name: "wordpress".to_string(),
                target_namespace: "wp-ns".to_string(),
                values: None,
            }],
            ..request("wp", "0.1.0", "wordpress")
        })
        .await
}

#[tokio::test]
async fn test_get_deployment_reports_apps_of_its_clusters() {
    let harness = Harness::new();
    let id = wordpress_deployment(&harness).await;
    let apps = vec![wordpress_app("b-1", "Running")];
    seed_record(&harness, &id, "cluster-1", "Running", apps).await;

    let view = harness.service.get_deployment(&metadata(), &id).await.unwrap();
    assert_eq!(view.apps.len(), 1);
    assert_eq!(view.apps[0].id, "b-1");
    assert_eq!(view.apps[0].status.state, State::Running);
}

#[tokio::test]
async fn test_list_deployment_clusters() {
    let harness = Harness::new();
    let id = wordpress_deployment(&harness).await;
    seed_record(&harness, &id, "cluster-1", "Running", Vec::new()).await;
    seed_record(&harness, &id, "cluster-2", "Down", Vec::new()).await;

    let response = harness
        .service
        .list_deployment_clusters(
            &metadata(),
            &id,
            &ListRequest {
                order_by: "id desc".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(response.total_elements, 2);
    assert_eq!(response.clusters[0].id, "cluster-2");
    assert_eq!(response.clusters[0].status.state, State::Down);
    assert_eq!(response.clusters[1].name, "cluster-1 display");
}

#[tokio::test]
async fn test_list_deployment_clusters_of_unknown_deployment() {
    let harness = Harness::new();
    let err = harness
        .service
        .list_deployment_clusters(&metadata(), "unknown-id", &ListRequest::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_list_deployment_clusters_rejects_bad_order() {
    let harness = Harness::new();
    let err = harness
        .service
        .list_deployment_clusters(
            &metadata(),
            "some-id",
            &ListRequest {
                order_by: "id sideways".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err
        .message()
        .starts_with("cannot list clusters for given deployment: some-id,"));
}

#[tokio::test]
async fn test_list_deployments_per_cluster() {
    let harness = Harness::new();
    let id = wordpress_deployment(&harness).await;
    let apps = vec![wordpress_app("b-1", "Running")];
    seed_record(&harness, &id, "cluster-1", "Running", apps).await;

    let response = harness
        .service
        .list_deployments_per_cluster(&metadata(), "cluster-1", &ListRequest::default())
        .await
        .unwrap();
    assert_eq!(response.total_elements, 1);
    let instance = &response.deployment_instances_cluster[0];
    assert_eq!(instance.deployment_uid, id);
    assert_eq!(instance.apps.len(), 1);

    let empty = harness
        .service
        .list_deployments_per_cluster(&metadata(), "cluster-9", &ListRequest::default())
        .await
        .unwrap();
    assert_eq!(empty.total_elements, 0);
}

#[tokio::test]
async fn test_list_deployments_per_cluster_requires_cluster_id() {
    let harness = Harness::new();
    let err = harness
        .service
        .list_deployments_per_cluster(&metadata(), "", &ListRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err, AdmError::invalid("incomplete request - cluster ID is missing"));
}

#[tokio::test]
async fn test_get_cluster_rolls_up_deployments() {
    let harness = Harness::new();
    let id = wordpress_deployment(&harness).await;
    seed_cluster(&harness, "cluster-1", &[]).await;
    let apps = vec![wordpress_app("b-1", "Down")];
    seed_record(&harness, &id, "cluster-1", "Down", apps).await;

    let detail = harness.service.get_cluster(&metadata(), "cluster-1").await.unwrap();
    assert_eq!(detail.id, "cluster-1");
    assert_eq!(detail.name, "cluster-1 display");
    assert_eq!(detail.status.state, State::Down);
    assert_eq!(detail.status.summary.down, 1);
    assert_eq!(detail.apps.len(), 1);
}

#[tokio::test]
async fn test_get_unknown_cluster() {
    let harness = Harness::new();
    let err = harness
        .service
        .get_cluster(&metadata(), "cluster-9")
        .await
        .unwrap_err();
    assert_eq!(err, AdmError::NotFound("cluster id cluster-9 not found".to_string()));
}

#[tokio::test]
async fn test_list_clusters_filters_by_label() {
    let harness = Harness::new();
    seed_cluster(&harness, "cluster-1", &[("zone", "east")]).await;
    seed_cluster(&harness, "cluster-2", &[("zone", "west")]).await;

    let all = harness
        .service
        .list_clusters(&metadata(), &ListRequest::default())
        .await
        .unwrap();
    assert_eq!(all.total_elements, 2);

    let east = harness
        .service
        .list_clusters(
            &metadata(),
            &ListRequest {
                labels: vec!["zone=east".to_string()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(east.total_elements, 1);
    assert_eq!(east.clusters[0].id, "cluster-1");
    assert_eq!(east.clusters[0].name, "cluster-1 display");
}

#[tokio::test]
async fn test_get_kube_config() {
    let harness = Harness::new();
    seed_cluster(&harness, "cluster-1", &[]).await;
    harness
        .store
        .create_secret(
            TENANT,
            &Secret {
                metadata: ObjectMeta {
                    name: Some("cluster-1-kubeconfig".to_string()),
                    ..Default::default()
                },
                data: Some(BTreeMap::from([(
                    "value".to_string(),
                    ByteString(b"apiVersion: v1\nkind: Config\n".to_vec()),
                )])),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let raw = harness
        .service
        .get_kube_config(&metadata(), "cluster-1")
        .await
        .unwrap();
    assert_eq!(raw, b"apiVersion: v1\nkind: Config\n");
}

#[tokio::test]
async fn test_get_app_namespace() {
    let harness = Harness::new();
    let id = wordpress_deployment(&harness).await;
    let apps = vec![wordpress_app("b-1", "Running")];
    seed_record(&harness, &id, "cluster-1", "Running", apps).await;

    let namespace = harness
        .service
        .get_app_namespace(&metadata(), "b-1")
        .await
        .unwrap();
    assert_eq!(namespace, "wp-ns");

    let err = harness
        .service
        .get_app_namespace(&metadata(), "b-404")
        .await
        .unwrap_err();
    assert_eq!(err, AdmError::NotFound("application b-404 not found".to_string()));
}
