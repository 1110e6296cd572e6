//! Deployment API handlers.
//!
//! Each handler builds the request metadata from the HTTP headers and
//! calls the matching [`DeploymentService`] operation.

use super::error::ProblemDetails;
use super::ServerState;
use crate::deployment::{
    ApiDeployment, ApiExtensionToken, ClusterDetail, DeleteType, DeploymentService,
    DeploymentsStatus, ListClustersResponse, ListDeploymentClustersResponse,
    ListDeploymentsPerClusterResponse, ListDeploymentsResponse, ListRequest, UiExtension,
};
use crate::tenant::RequestMetadata;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

type ApiResult<T> = Result<Json<T>, ProblemDetails>;

/// Lowercase header name to every value sent for it
pub fn request_metadata(headers: &HeaderMap) -> RequestMetadata {
    let mut metadata = RequestMetadata::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            metadata
                .entry(name.as_str().to_string())
                .or_default()
                .push(value.to_string());
        }
    }
    metadata
}

/// Build a [`ListRequest`] from query pairs; `labels` may repeat
pub fn list_request(params: &[(String, String)]) -> Result<ListRequest, ProblemDetails> {
    let mut request = ListRequest::default();
    for (key, value) in params {
        match key.as_str() {
            "labels" => request.labels.push(value.clone()),
            "orderBy" => request.order_by.clone_from(value),
            "filter" => request.filter.clone_from(value),
            "pageSize" => request.page_size = parse_number(key, value)?,
            "offset" => request.offset = parse_number(key, value)?,
            _ => {}
        }
    }
    Ok(request)
}

fn parse_number(key: &str, value: &str) -> Result<i32, ProblemDetails> {
    value
        .parse()
        .map_err(|e| ProblemDetails::bad_request(format!("{key} must be an integer: {e}")))
}

fn service(state: &ServerState) -> Result<&Arc<DeploymentService>, ProblemDetails> {
    state.service().ok_or_else(|| ProblemDetails {
        error_type: "urn:app-deployment-manager:error:unavailable".into(),
        title: "Service Unavailable".into(),
        status: 503,
        detail: Some("deployment service is starting".into()),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeploymentResponse {
    pub deployment_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeploymentResponse {
    pub deployment: ApiDeployment,
}

#[derive(Debug, Serialize)]
pub struct ClusterResponse {
    pub cluster: ClusterDetail,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeConfigResponse {
    /// Base64 of the raw kubeconfig
    pub kube_config_info: String,
}

#[derive(Debug, Serialize)]
pub struct AppNamespaceResponse {
    pub namespace: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUiExtensionsResponse {
    pub ui_extensions: Vec<UiExtension>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteParams {
    pub delete_type: DeleteType,
}

/// POST /deployments
pub async fn create_deployment(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<ApiDeployment>,
) -> Result<(StatusCode, Json<CreateDeploymentResponse>), ProblemDetails> {
    let deployment_id = service(&state)?
        .create_deployment(&request_metadata(&headers), body)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateDeploymentResponse { deployment_id }),
    ))
}

/// GET /deployments
pub async fn list_deployments(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<ListDeploymentsResponse> {
    let request = list_request(&params)?;
    let response = service(&state)?
        .list_deployments(&request_metadata(&headers), &request)
        .await?;
    Ok(Json(response))
}

/// GET /deployments/{id}
pub async fn get_deployment(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<DeploymentResponse> {
    let deployment = service(&state)?
        .get_deployment(&request_metadata(&headers), &id)
        .await?;
    Ok(Json(DeploymentResponse { deployment }))
}

/// PUT /deployments/{id}
pub async fn update_deployment(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ApiDeployment>,
) -> ApiResult<DeploymentResponse> {
    let deployment = service(&state)?
        .update_deployment(&request_metadata(&headers), &id, body)
        .await?;
    Ok(Json(DeploymentResponse { deployment }))
}

/// DELETE /deployments/{id}?deleteType=PARENT_ONLY|ALL
pub async fn delete_deployment(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ProblemDetails> {
    service(&state)?
        .delete_deployment(&request_metadata(&headers), &id, params.delete_type)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /summary/deployments_status
pub async fn get_deployments_status(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<DeploymentsStatus> {
    let request = list_request(&params)?;
    let status = service(&state)?
        .get_deployments_status(&request_metadata(&headers), &request.labels)
        .await?;
    Ok(Json(status))
}

/// GET /deployments/{id}/clusters
pub async fn list_deployment_clusters(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<ListDeploymentClustersResponse> {
    let request = list_request(&params)?;
    let response = service(&state)?
        .list_deployment_clusters(&request_metadata(&headers), &id, &request)
        .await?;
    Ok(Json(response))
}

/// GET /deployments/clusters/{cluster_id}
pub async fn list_deployments_per_cluster(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(cluster_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<ListDeploymentsPerClusterResponse> {
    let request = list_request(&params)?;
    let response = service(&state)?
        .list_deployments_per_cluster(&request_metadata(&headers), &cluster_id, &request)
        .await?;
    Ok(Json(response))
}

/// GET /clusters
pub async fn list_clusters(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<ListClustersResponse> {
    let request = list_request(&params)?;
    let response = service(&state)?
        .list_clusters(&request_metadata(&headers), &request)
        .await?;
    Ok(Json(response))
}

/// GET /clusters/{cluster_id}
pub async fn get_cluster(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(cluster_id): Path<String>,
) -> ApiResult<ClusterResponse> {
    let cluster = service(&state)?
        .get_cluster(&request_metadata(&headers), &cluster_id)
        .await?;
    Ok(Json(ClusterResponse { cluster }))
}

/// GET /clusters/{cluster_id}/kubeconfig
pub async fn get_kube_config(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(cluster_id): Path<String>,
) -> ApiResult<KubeConfigResponse> {
    let raw = service(&state)?
        .get_kube_config(&request_metadata(&headers), &cluster_id)
        .await?;
    Ok(Json(KubeConfigResponse {
        kube_config_info: base64::engine::general_purpose::STANDARD.encode(raw),
    }))
}

/// GET /apiextensions/{name}
pub async fn get_api_extension(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> ApiResult<ApiExtensionToken> {
    let token = service(&state)?
        .get_api_extension(&request_metadata(&headers), &name)
        .await?;
    Ok(Json(token))
}

/// GET /ui_extensions?serviceName=...
pub async fn list_ui_extensions(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<ListUiExtensionsResponse> {
    let service_names: Vec<String> = params
        .into_iter()
        .filter(|(key, _)| key == "serviceName")
        .map(|(_, value)| value)
        .collect();
    let ui_extensions = service(&state)?
        .list_ui_extensions(&request_metadata(&headers), &service_names)
        .await?;
    Ok(Json(ListUiExtensionsResponse { ui_extensions }))
}

/// GET /appnamespace/{app_id}
pub async fn get_app_namespace(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(app_id): Path<String>,
) -> ApiResult<AppNamespaceResponse> {
    let namespace = service(&state)?
        .get_app_namespace(&request_metadata(&headers), &app_id)
        .await?;
    Ok(Json(AppNamespaceResponse { namespace }))
}
