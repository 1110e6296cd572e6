//! # Request Validation
//!
//! Boundary rules for ids, versions, label strings and namespace names.
//! Messages follow the `validation error:` layout callers already parse.

use crate::error::{AdmError, AdmResult};
use regex::Regex;
use std::sync::LazyLock;

pub const ID_PATTERN: &str = "^[a-z0-9][a-z0-9-]{0,38}[a-z0-9]{0,1}$";
pub const APP_VERSION_PATTERN: &str = "^[a-z0-9][a-z0-9.-]{0,18}[a-z0-9]{0,1}$";
pub const LABEL_PATTERN: &str = "(^$)|^[a-z0-9]([-_.=,a-z0-9]{0,198}[a-z0-9])?$";

static ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(ID_PATTERN).expect("Failed to compile id pattern - this should never happen")
});

static APP_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(APP_VERSION_PATTERN)
        .expect("Failed to compile app version pattern - this should never happen")
});

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(LABEL_PATTERN).expect("Failed to compile label pattern - this should never happen")
});

fn pattern_error(field: &str, pattern: &str) -> AdmError {
    AdmError::invalid(format!(
        "validation error:\n - {field}: value does not match regex pattern `{pattern}` [string.pattern]"
    ))
}

/// Deployment or cluster id
pub fn validate_id(field: &str, value: &str) -> AdmResult<()> {
    if ID_RE.is_match(value) {
        Ok(())
    } else {
        Err(pattern_error(field, ID_PATTERN))
    }
}

/// Catalog application or package version
pub fn validate_app_version(field: &str, value: &str) -> AdmResult<()> {
    if APP_VERSION_RE.is_match(value) {
        Ok(())
    } else {
        Err(pattern_error(field, APP_VERSION_PATTERN))
    }
}

/// Every label string of a List request, plus the size cap
pub fn validate_labels(labels: &[String], max: usize) -> AdmResult<()> {
    if labels.len() > max {
        return Err(AdmError::invalid(format!(
            "labels array exceeds maximum size of {max} items"
        )));
    }
    for (i, label) in labels.iter().enumerate() {
        if !LABEL_RE.is_match(label) {
            return Err(pattern_error(&format!("labels[{i}]"), LABEL_PATTERN));
        }
    }
    Ok(())
}

/// Application name inside `overrideValues`
pub fn validate_override_app_name(index: usize, app_name: &str) -> AdmResult<()> {
    if app_name.is_empty() {
        return Err(AdmError::invalid(format!(
            "validation error:\n - deployment.override_values[{index}].app_name: value length must be at least 1 characters [string.min_len]\n - deployment.override_values[{index}].app_name: value does not match regex pattern `{ID_PATTERN}` [string.pattern]"
        )));
    }
    if !ID_RE.is_match(app_name) {
        return Err(pattern_error(
            &format!("deployment.override_values[{index}].app_name"),
            ID_PATTERN,
        ));
    }
    Ok(())
}

/// Namespace declared by a package or requested as target namespace
pub fn validate_namespace_name(name: &str) -> AdmResult<()> {
    if name.is_empty() {
        return Err(AdmError::invalid("missing namespace name"));
    }
    if name == "default" {
        return Err(AdmError::invalid(format!(
            "namespace name \"{name}\" is invalid. Namespace name cannot be \"default\""
        )));
    }
    if name.split('-').next() == Some("kind") {
        return Err(AdmError::invalid(format!(
            "namespace name \"{name}\" is invalid. Prefix \"kind-\", is reserved for Kubernetes system namespaces"
        )));
    }
    if !ID_RE.is_match(name) {
        return Err(AdmError::invalid(format!(
            "namespace name \"{name}\" is invalid. Use names that conforms with RFC 1123 label"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids() {
        assert!(validate_id("deployment_id", "7f3e9a2c-1b1d-4f7e-9d1a-3c6b2a1f0e55").is_ok());
        assert!(validate_id("deployment_id", "cluster-1").is_ok());
        assert!(validate_id("deployment_id", "a").is_ok());
        let err = validate_id("cluster_id", "Cluster").unwrap_err();
        assert_eq!(
            err.message(),
            "validation error:\n - cluster_id: value does not match regex pattern `^[a-z0-9][a-z0-9-]{0,38}[a-z0-9]{0,1}$` [string.pattern]"
        );
    }

    #[test]
    fn test_app_version() {
        assert!(validate_app_version("app_version", "0.1.0").is_ok());
        assert!(validate_app_version("app_version", "1.2.3-rc.1").is_ok());
        assert!(validate_app_version("app_version", "V1").is_err());
        assert!(validate_app_version("app_version", "").is_err());
    }

    #[test]
    fn test_labels() {
        assert!(validate_labels(&["ok=fine".to_string()], 20).is_ok());
        assert!(validate_labels(&[String::new()], 20).is_ok());
        assert!(validate_labels(&["TEST".to_string()], 20).is_err());
        assert!(validate_labels(&vec!["a=b".to_string(); 20], 20).is_ok());
        let err = validate_labels(&vec!["a=b".to_string(); 21], 20).unwrap_err();
        assert_eq!(err.message(), "labels array exceeds maximum size of 20 items");
    }

    #[test]
    fn test_namespace_names() {
        assert!(validate_namespace_name("wordpress").is_ok());
        assert_eq!(
            validate_namespace_name("").unwrap_err().message(),
            "missing namespace name"
        );
        assert!(validate_namespace_name("default")
            .unwrap_err()
            .message()
            .contains("cannot be \"default\""));
        assert!(validate_namespace_name("kind-system")
            .unwrap_err()
            .message()
            .contains("reserved"));
        assert!(validate_namespace_name("Bad_Name")
            .unwrap_err()
            .message()
            .contains("RFC 1123"));
    }

    #[test]
    fn test_override_app_name() {
        assert!(validate_override_app_name(0, "wordpress").is_ok());
        let err = validate_override_app_name(2, "").unwrap_err();
        assert!(err
            .message()
            .starts_with("validation error:\n - deployment.override_values[2].app_name: value length"));
    }
}
