//! # Observability
//!
//! Prometheus metrics for the deployment API. Logging goes through
//! `tracing` and is configured at startup.

pub mod metrics;
