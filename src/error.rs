//! # Error Types
//!
//! The engine's error taxonomy. Every collaborator error (object store,
//! catalog, policy service, credential store) is mapped into one of these
//! kinds before it leaves the engine.

use thiserror::Error;

/// Result alias used throughout the engine
pub type AdmResult<T> = std::result::Result<T, AdmError>;

/// Deployment manager error with classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdmError {
    /// Schema or regex violation, missing field, bad parameter template
    #[error("{0}")]
    Invalid(String),
    /// Policy decision was not `true`
    #[error("{0}")]
    Forbidden(String),
    /// Unknown id within the tenant or missing catalog entity
    #[error("{0}")]
    NotFound(String),
    /// Duplicate display name or forbids-multiple violated in the store
    #[error("{0}")]
    AlreadyExists(String),
    /// Update or delete of a deployment that still has parents
    #[error("{0}")]
    FailedPrecondition(String),
    /// Optimistic concurrency collision on store update
    #[error("{0}")]
    Conflict(String),
    /// Missing tenant, unreachable collaborator, transport error
    #[error("{0}")]
    Unavailable(String),
    /// Recursion bound exceeded or integrity invariant violated
    #[error("{0}")]
    Internal(String),
    /// Anything else
    #[error("{0}")]
    Unknown(String),
}

impl AdmError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the error kind string for metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmError::Invalid(_) => "invalid",
            AdmError::Forbidden(_) => "forbidden",
            AdmError::NotFound(_) => "not_found",
            AdmError::AlreadyExists(_) => "already_exists",
            AdmError::FailedPrecondition(_) => "failed_precondition",
            AdmError::Conflict(_) => "conflict",
            AdmError::Unavailable(_) => "unavailable",
            AdmError::Internal(_) => "internal",
            AdmError::Unknown(_) => "unknown",
        }
    }

    /// The message without classification
    pub fn message(&self) -> &str {
        match self {
            AdmError::Invalid(m)
            | AdmError::Forbidden(m)
            | AdmError::NotFound(m)
            | AdmError::AlreadyExists(m)
            | AdmError::FailedPrecondition(m)
            | AdmError::Conflict(m)
            | AdmError::Unavailable(m)
            | AdmError::Internal(m)
            | AdmError::Unknown(m) => m,
        }
    }

    /// Transport-level errors a caller may retry
    pub fn is_transient(&self) -> bool {
        matches!(self, AdmError::Unavailable(_) | AdmError::Unknown(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AdmError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, AdmError::AlreadyExists(_))
    }

    /// HTTP status code the API layer answers with
    pub fn http_status(&self) -> u16 {
        match self {
            AdmError::Invalid(_) => 400,
            AdmError::Forbidden(_) => 403,
            AdmError::NotFound(_) => 404,
            AdmError::AlreadyExists(_) | AdmError::Conflict(_) => 409,
            AdmError::FailedPrecondition(_) => 412,
            AdmError::Unavailable(_) => 503,
            AdmError::Internal(_) | AdmError::Unknown(_) => 500,
        }
    }
}

impl From<kube::Error> for AdmError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(api_err) => {
                let msg = api_err.message.clone();
                match api_err.code {
                    409 if api_err.reason == "AlreadyExists" => AdmError::AlreadyExists(msg),
                    409 => AdmError::Conflict(msg),
                    400 | 413 | 422 => AdmError::Invalid(msg),
                    401 | 403 => AdmError::Forbidden(msg),
                    404 => AdmError::NotFound(msg),
                    429 | 503 | 504 => AdmError::Unavailable(msg),
                    500 => AdmError::Internal(msg),
                    _ => AdmError::Unknown(msg),
                }
            }
            other => AdmError::Unavailable(other.to_string()),
        }
    }
}

impl AdmError {
    /// Classify a non-success HTTP answer from a REST collaborator
    pub fn from_http_status(code: u16, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match code {
            404 => AdmError::NotFound(msg),
            400 | 422 => AdmError::Invalid(msg),
            401 | 403 => AdmError::Forbidden(msg),
            409 => AdmError::AlreadyExists(msg),
            429 | 502 | 503 | 504 => AdmError::Unavailable(msg),
            _ => AdmError::Unknown(msg),
        }
    }
}

impl From<reqwest::Error> for AdmError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => AdmError::from_http_status(status.as_u16(), err.to_string()),
            None => AdmError::Unavailable(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AdmError {
    fn from(err: serde_json::Error) -> Self {
        AdmError::Internal(format!("json error: {err}"))
    }
}
