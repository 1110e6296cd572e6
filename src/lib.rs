//! Application Deployment Manager Library
//!
//! This library provides the deployment lifecycle engine behind the
//! `app-deployment-manager` server and the `admctl` operator CLI.
//! Tests are included in the module files and under `tests/`.

pub mod authz;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod crd;
pub mod deployment;
pub mod error;
pub mod labels;
pub mod observability;
pub mod query;
pub mod runtime;
pub mod server;
pub mod store;
pub mod tenant;
pub mod validation;

// Re-export CRD types for convenience
pub use crd::*;
pub use error::{AdmError, AdmResult};
