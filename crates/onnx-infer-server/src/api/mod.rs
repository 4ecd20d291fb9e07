//! The JSON transport (C6): a single inference route plus liveness and
//! readiness probes, built on salvo.

pub mod error;
pub mod json;
pub mod request_id;

pub use json::router;
