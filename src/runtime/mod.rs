//! # Runtime Module
//!
//! Process startup: crypto provider, tracing, metrics, HTTP server and
//! the deployment service wiring.

pub mod initialization;

pub use initialization::*;
