//! Paging, ordering and label filtering of ListDeployments.

mod common;

use app_deployment_manager::deployment::{ApiDeployment, ListRequest, TargetClusters};
use app_deployment_manager::error::AdmError;
use common::{metadata, request, Harness, PackageSpec};
use std::collections::BTreeMap;

async fn seeded(count: usize) -> Harness {
    let harness = Harness::new();
    harness.add_package(PackageSpec::new("wp", "0.1.0", "wordpress"));
    for i in 0..count {
        harness
            .create(ApiDeployment {
                display_name: format!("d-{i:02}"),
                ..request("wp", "0.1.0", "wordpress")
            })
            .await;
    }
    harness
}

fn labels(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("key{i}=value{i}")).collect()
}

#[tokio::test]
async fn test_zero_page_size_uses_default() {
    let harness = seeded(12).await;
    let response = harness
        .service
        .list_deployments(&metadata(), &ListRequest::default())
        .await
        .unwrap();
    assert_eq!(response.deployments.len(), 10);
    assert_eq!(response.total_elements, 12);
}

#[tokio::test]
async fn test_offset_selects_second_page() {
    let harness = seeded(12).await;
    let response = harness
        .service
        .list_deployments(
            &metadata(),
            &ListRequest {
                order_by: "displayName".to_string(),
                page_size: 5,
                offset: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let names: Vec<_> = response.deployments.iter().map(|d| d.display_name.as_str()).collect();
    assert_eq!(names, ["d-10", "d-11"]);
    assert_eq!(response.total_elements, 12);

    let past_end = harness
        .service
        .list_deployments(
            &metadata(),
            &ListRequest {
                offset: 40,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(past_end.deployments.is_empty());
}

#[tokio::test]
async fn test_page_size_above_maximum_is_invalid() {
    let harness = seeded(0).await;
    let err = harness
        .service
        .list_deployments(
            &metadata(),
            &ListRequest {
                page_size: 101,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.as_str(), "invalid");

    harness
        .service
        .list_deployments(
            &metadata(),
            &ListRequest {
                page_size: 100,
                ..Default::default()
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_deployment_label_cap() {
    let harness = seeded(0).await;
    let at_cap = ListRequest {
        labels: labels(20),
        ..Default::default()
    };
    harness.service.list_deployments(&metadata(), &at_cap).await.unwrap();

    let over_cap = ListRequest {
        labels: labels(21),
        ..Default::default()
    };
    let err = harness
        .service
        .list_deployments(&metadata(), &over_cap)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AdmError::invalid("labels array exceeds maximum size of 20 items")
    );
}

#[tokio::test]
async fn test_cluster_label_cap() {
    let harness = Harness::new();
    harness
        .service
        .list_clusters(
            &metadata(),
            &ListRequest {
                labels: labels(100),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let err = harness
        .service
        .list_clusters(
            &metadata(),
            &ListRequest {
                labels: labels(101),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AdmError::invalid("labels array exceeds maximum size of 100 items")
    );
}

#[tokio::test]
async fn test_label_pattern() {
    let harness = seeded(0).await;
    let err = harness
        .service
        .list_deployments(
            &metadata(),
            &ListRequest {
                labels: vec!["TEST".to_string()],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.message().contains("labels[0]"), "{err:?}");

    harness
        .service
        .list_deployments(
            &metadata(),
            &ListRequest {
                labels: vec!["ok=fine".to_string()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_order_by_display_name_descending() {
    let harness = seeded(3).await;
    let response = harness
        .service
        .list_deployments(
            &metadata(),
            &ListRequest {
                order_by: "displayName desc".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let names: Vec<_> = response.deployments.iter().map(|d| d.display_name.as_str()).collect();
    assert_eq!(names, ["d-02", "d-01", "d-00"]);
}

#[tokio::test]
async fn test_invalid_order_direction() {
    let harness = seeded(0).await;
    let err = harness
        .service
        .list_deployments(
            &metadata(),
            &ListRequest {
                order_by: "displayName upward".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AdmError::invalid("invalid order direction; must be 'asc' or 'desc'")
    );
}

#[tokio::test]
async fn test_filter_matches_substring() {
    let harness = seeded(12).await;
    let response = harness
        .service
        .list_deployments(
            &metadata(),
            &ListRequest {
                filter: "displayName=d-1".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(response.total_elements, 2);
}

#[tokio::test]
async fn test_label_filter_matches_targets() {
    let harness = seeded(2).await;
    harness
        .create(ApiDeployment {
            display_name: "on-mars".to_string(),
            target_clusters: vec![TargetClusters {
                app_name: "wordpress".to_string(),
                labels: Some(BTreeMap::from([("hello".to_string(), "mars".to_string())])),
                cluster_id: String::new(),
            }],
            ..request("wp", "0.1.0", "wordpress")
        })
        .await;

    let list = |label: &str| ListRequest {
        labels: vec![label.to_string()],
        ..Default::default()
    };
    let world = harness
        .service
        .list_deployments(&metadata(), &list("hello=world"))
        .await
        .unwrap();
    assert_eq!(world.total_elements, 2);

    let mars = harness
        .service
        .list_deployments(&metadata(), &list("hello=mars"))
        .await
        .unwrap();
    assert_eq!(mars.total_elements, 1);
    assert_eq!(mars.deployments[0].display_name, "on-mars");

    let status = harness
        .service
        .get_deployments_status(&metadata(), &["hello=mars".to_string()])
        .await
        .unwrap();
    assert_eq!(status.total, 0);
}
