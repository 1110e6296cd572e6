//! # Tenant Identity
//!
//! Every request carries exactly one tenant id in its metadata. The id is
//! both the store namespace and the label-selector value for isolation.

use crate::constants::ACTIVE_PROJECT_ID_HEADER;
use crate::error::{AdmError, AdmResult};
use std::collections::BTreeMap;

/// Request metadata: lowercase key to every value sent for it
pub type RequestMetadata = BTreeMap<String, Vec<String>>;

/// Extract the tenant id from request metadata
pub fn active_project_id(metadata: &RequestMetadata) -> AdmResult<String> {
    let ids = metadata
        .get(ACTIVE_PROJECT_ID_HEADER)
        .map(Vec::as_slice)
        .unwrap_or_default();
    match ids {
        [] => Err(AdmError::invalid("activeprojectid is not set")),
        [id] => Ok(id.clone()),
        _ => Err(AdmError::invalid(
            "multiple ActiveProjectIDs are set - it should be one",
        )),
    }
}

/// Tenant id for a write or read; missing or ambiguous ids surface as unavailable
pub fn require_tenant(metadata: &RequestMetadata) -> AdmResult<String> {
    active_project_id(metadata)
        .map_err(|e| AdmError::Unavailable(format!("failed to get tenant project ID {e}")))
}

/// Metadata carrying a single tenant id
pub fn metadata_for_tenant(tenant: &str) -> RequestMetadata {
    RequestMetadata::from([(ACTIVE_PROJECT_ID_HEADER.to_string(), vec![tenant.to_string()])])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tenant() {
        assert_eq!(active_project_id(&metadata_for_tenant("t1")).unwrap(), "t1");
    }

    #[test]
    fn test_missing_tenant() {
        let err = active_project_id(&RequestMetadata::new()).unwrap_err();
        assert_eq!(err, AdmError::invalid("activeprojectid is not set"));
        let err = require_tenant(&RequestMetadata::new()).unwrap_err();
        assert_eq!(
            err,
            AdmError::Unavailable(
                "failed to get tenant project ID activeprojectid is not set".to_string(),
            )
        );
    }

    #[test]
    fn test_multiple_tenants() {
        let md = RequestMetadata::from([(
            "activeprojectid".to_string(),
            vec!["a".to_string(), "b".to_string()],
        )]);
        assert_eq!(
            active_project_id(&md).unwrap_err().message(),
            "multiple ActiveProjectIDs are set - it should be one"
        );
    }
}
