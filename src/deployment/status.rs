//! # Status Rollup
//!
//! GetDeploymentsStatus folds every deployment's own summary into the
//! eight state buckets.

use super::model::{DeploymentStatusView, DeploymentsStatus, State};
use super::read::{matches_labels, status_view};
use super::{observe, DeploymentService};
use crate::constants::MAX_LABELS_PER_REQUEST_DEPLOYMENTS;
use crate::error::AdmResult;
use crate::labels::tenant_selector;
use crate::tenant::{require_tenant, RequestMetadata};
use crate::validation::validate_labels;
use serde_json::json;
use tracing::{debug, info_span, Instrument};

fn add(bucket: &mut i32, count: i32) {
    *bucket = bucket.saturating_add(count.max(0));
}

/// Distribute one deployment's counts over the buckets
pub(crate) fn tally(counts: &mut DeploymentsStatus, status: &DeploymentStatusView) {
    let summary = &status.summary;
    add(&mut counts.total, summary.total);
    match status.state {
        State::Error => add(&mut counts.error, summary.total),
        State::Terminating => add(&mut counts.terminating, summary.total),
        state => {
            add(&mut counts.running, summary.running);
            match state {
                State::Running => {}
                State::Deploying => add(&mut counts.deploying, summary.down),
                State::Updating => add(&mut counts.updating, summary.down),
                State::Unknown => add(&mut counts.unknown, summary.unknown),
                _ => add(&mut counts.down, summary.down),
            }
        }
    }
}

impl DeploymentService {
    /// State bucket counts over the tenant's deployments matching `labels`
    pub async fn get_deployments_status(
        &self,
        metadata: &RequestMetadata,
        labels: &[String],
    ) -> AdmResult<DeploymentsStatus> {
        let span = info_span!("adm.get_deployments_status", labels = ?labels);
        observe("GetDeploymentsStatus", async move {
            validate_labels(labels, MAX_LABELS_PER_REQUEST_DEPLOYMENTS)?;
            self.authorize(
                "GetDeploymentsStatus",
                &json!({ "labels": labels }),
                metadata,
                "cannot get status of deployments",
            )
            .await?;
            let tenant = require_tenant(metadata)?;

            let deployments = self
                .store
                .list_deployments(&tenant, &tenant_selector(&tenant))
                .await?;
            let mut counts = DeploymentsStatus::default();
            for deployment in deployments.iter().filter(|d| matches_labels(d, labels)) {
                tally(&mut counts, &status_view(deployment.status.as_ref()));
            }
            debug!(?counts, "Computed deployment status counts");
            Ok(counts)
        })
        .instrument(span)
        .await
    }
}
