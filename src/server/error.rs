//! Problem-details error responses.

use crate::error::AdmError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// RFC 9457 problem details body
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub error_type: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProblemDetails {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            error_type: "urn:app-deployment-manager:error:invalid".into(),
            title: "Bad Request".into(),
            status: 400,
            detail: Some(detail.into()),
        }
    }

    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self {
            error_type: "urn:app-deployment-manager:error:internal".into(),
            title: "Internal Server Error".into(),
            status: 500,
            detail: Some(detail.into()),
        }
    }
}

impl From<AdmError> for ProblemDetails {
    fn from(err: AdmError) -> Self {
        let status = err.http_status();
        let title = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Error");
        Self {
            error_type: format!("urn:app-deployment-manager:error:{}", err.as_str()),
            title: title.to_string(),
            status,
            detail: Some(err.message().to_string()),
        }
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Json(&self).into_response();
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_to_status() {
        let cases = [
            (AdmError::invalid("x"), 400),
            (AdmError::Forbidden("x".into()), 403),
            (AdmError::NotFound("x".into()), 404),
            (AdmError::AlreadyExists("x".into()), 409),
            (AdmError::Conflict("x".into()), 409),
            (AdmError::FailedPrecondition("x".into()), 412),
            (AdmError::Unavailable("x".into()), 503),
            (AdmError::internal("x"), 500),
            (AdmError::Unknown("x".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(ProblemDetails::from(err).status, status);
        }
    }

    #[test]
    fn test_problem_body() {
        let problem = ProblemDetails::from(AdmError::NotFound("deployment id d1 not found".into()));
        let body = serde_json::to_value(&problem).unwrap();
        assert_eq!(body["type"], "urn:app-deployment-manager:error:not_found");
        assert_eq!(body["title"], "Not Found");
        assert_eq!(body["detail"], "deployment id d1 not found");
    }

    #[test]
    fn test_response_content_type() {
        let response = ProblemDetails::bad_request("bad").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );
    }
}
