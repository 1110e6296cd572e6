//! # Metrics
//!
//! Request, secret and deployment metrics, exposed on `/metrics`.

mod api_metrics;
pub(crate) mod registry;

pub use api_metrics::*;

use anyhow::Result;
use prometheus::{Encoder, TextEncoder};
use registry::REGISTRY;

/// Register every metric with the process registry
///
/// Must be called once at startup; a second call fails with a duplicate
/// registration error.
pub fn register_metrics() -> Result<()> {
    api_metrics::register_api_metrics()?;
    Ok(())
}

/// Current metric values in the Prometheus text format
pub fn gather_text() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
