//! # API Metrics
//!
//! Per-operation request counters and latency, plus counters for the
//! secrets and child deployments the engine writes.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, IntGauge};
use std::sync::LazyLock;

static REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "adm_requests_total",
            "Total number of deployment API requests by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create REQUESTS_TOTAL metric - this should never happen")
});

static REQUEST_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "adm_request_errors_total",
            "Total number of failed deployment API requests by operation and error kind",
        ),
        &["operation", "kind"],
    )
    .expect("Failed to create REQUEST_ERRORS_TOTAL metric - this should never happen")
});

static REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "adm_request_duration_seconds",
            "Duration of deployment API requests in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create REQUEST_DURATION metric - this should never happen")
});

static SECRETS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "adm_secrets_created_total",
        "Total number of secrets created for deployments",
    )
    .expect("Failed to create SECRETS_CREATED_TOTAL metric - this should never happen")
});

static SECRETS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "adm_secrets_deleted_total",
        "Total number of deployment secrets deleted",
    )
    .expect("Failed to create SECRETS_DELETED_TOTAL metric - this should never happen")
});

static CHILD_DEPLOYMENTS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "adm_child_deployments_created_total",
        "Total number of child deployments created for package dependencies",
    )
    .expect("Failed to create CHILD_DEPLOYMENTS_CREATED_TOTAL metric - this should never happen")
});

static DEPLOYMENTS_MANAGED: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "adm_deployments_managed",
        "Number of deployments seen by the last list of a tenant",
    )
    .expect("Failed to create DEPLOYMENTS_MANAGED metric - this should never happen")
});

pub(crate) fn register_api_metrics() -> Result<()> {
    REGISTRY.register(Box::new(REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEST_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(SECRETS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CHILD_DEPLOYMENTS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEPLOYMENTS_MANAGED.clone()))?;
    Ok(())
}

pub fn increment_requests_total(operation: &str) {
    REQUESTS_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_request_errors_total(operation: &str, kind: &str) {
    REQUEST_ERRORS_TOTAL
        .with_label_values(&[operation, kind])
        .inc();
}

pub fn observe_request_duration(operation: &str, duration: f64) {
    REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_secrets_created() {
    SECRETS_CREATED_TOTAL.inc();
}

pub fn increment_secrets_deleted() {
    SECRETS_DELETED_TOTAL.inc();
}

pub fn increment_child_deployments_created() {
    CHILD_DEPLOYMENTS_CREATED_TOTAL.inc();
}

pub fn set_deployments_managed(count: usize) {
    DEPLOYMENTS_MANAGED.set(i64::try_from(count).unwrap_or(i64::MAX));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_requests_total() {
        let before = REQUESTS_TOTAL.with_label_values(&["MetricsProbe"]).get();
        increment_requests_total("MetricsProbe");
        let after = REQUESTS_TOTAL.with_label_values(&["MetricsProbe"]).get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_increment_request_errors_total() {
        let before = REQUEST_ERRORS_TOTAL
            .with_label_values(&["MetricsProbe", "invalid"])
            .get();
        increment_request_errors_total("MetricsProbe", "invalid");
        let after = REQUEST_ERRORS_TOTAL
            .with_label_values(&["MetricsProbe", "invalid"])
            .get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_increment_secrets_created() {
        let before = SECRETS_CREATED_TOTAL.get();
        increment_secrets_created();
        assert!(SECRETS_CREATED_TOTAL.get() > before);
    }

    #[test]
    fn test_observe_request_duration() {
        observe_request_duration("ListDeployments", 0.2);
        // Just verify it doesn't panic
    }

    #[test]
    fn test_set_deployments_managed() {
        set_deployments_managed(3);
        assert!(DEPLOYMENTS_MANAGED.get() >= 0);
    }
}
