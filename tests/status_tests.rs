//! Deployment state rollup and the extension read paths.

mod common;

use app_deployment_manager::config::AdmConfig;
use app_deployment_manager::crd::{DeploymentStatus, Summary};
use app_deployment_manager::deployment::{ApiDeployment, DeploymentsStatus, State};
use app_deployment_manager::error::AdmError;
use common::{metadata, request, Harness, PackageSpec, TENANT};

fn status(state: &str, total: i32, running: i32, down: i32) -> DeploymentStatus {
    DeploymentStatus {
        state: state.to_string(),
        summary: Summary {
            total,
            running,
            down,
            unknown: 0,
        },
        ..Default::default()
    }
}

async fn with_status(harness: &Harness, display_name: &str, status: DeploymentStatus) -> String {
    let id = harness
        .create(ApiDeployment {
            display_name: display_name.to_string(),
            ..request("wp", "0.1.0", "wordpress")
        })
        .await;
    let name = harness
        .service
        .get_deployment(&metadata(), &id)
        .await
        .unwrap()
        .name;
    harness
        .store
        .set_deployment_status(TENANT, &name, status)
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn test_status_rollup_over_deployments() {
    let harness = Harness::new();
    harness.add_package(PackageSpec::new("wp", "0.1.0", "wordpress"));
    with_status(&harness, "a", status("Running", 2, 2, 0)).await;
    with_status(&harness, "b", status("Down", 3, 2, 1)).await;
    let last = with_status(&harness, "c", status("Down", 4, 3, 1)).await;

    let counts = harness
        .service
        .get_deployments_status(&metadata(), &[])
        .await
        .unwrap();
    assert_eq!(
        counts,
        DeploymentsStatus {
            total: 9,
            running: 7,
            down: 2,
            ..Default::default()
        }
    );

    let view = harness.service.get_deployment(&metadata(), &last).await.unwrap();
    let projected = view.status.unwrap();
    assert_eq!(projected.state, State::Down);
    assert_eq!(projected.summary.total, 4);
}

#[tokio::test]
async fn test_status_of_empty_tenant() {
    let harness = Harness::new();
    let counts = harness
        .service
        .get_deployments_status(&metadata(), &[])
        .await
        .unwrap();
    assert_eq!(counts, DeploymentsStatus::default());
}

#[tokio::test]
async fn test_extensions_disabled_by_default() {
    let harness = Harness::new();
    let err = harness
        .service
        .get_api_extension(&metadata(), "wp-api")
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
    assert!(err.message().contains("extensions are disabled"));

    let err = harness
        .service
        .list_ui_extensions(&metadata(), &[])
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
}

#[tokio::test]
async fn test_enabled_extensions_read_store() {
    let harness = Harness::with_config(AdmConfig {
        api_ext_enabled: true,
        ..AdmConfig::default()
    });
    let err = harness
        .service
        .get_api_extension(&metadata(), "wp-api")
        .await
        .unwrap_err();
    assert_eq!(err, AdmError::NotFound("API extension wp-api not found".to_string()));

    let extensions = harness
        .service
        .list_ui_extensions(&metadata(), &[])
        .await
        .unwrap();
    assert!(extensions.is_empty());
}
