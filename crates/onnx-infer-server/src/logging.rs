//! Structured logging types for wide format logging.
//!
//! Each category of events captures complete context in a single
//! structured log entry, in namespaced modules mirroring the transports
//! and lifecycle stages they describe.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Server lifecycle events
pub mod lifecycle {
    /// Emitted at process startup, before any transport binds.
    pub fn server_startup(version: &str) {
        tracing::info!(event = "server_startup", version = %version, "server starting");
    }

    /// Emitted when configuration has been parsed from the environment.
    pub fn config_loaded(json_bind: &str, grpc_bind: &str) {
        tracing::info!(
            event = "config_loaded",
            json_bind = %json_bind,
            grpc_bind = %grpc_bind,
            "configuration loaded"
        );
    }

    /// Emitted once each transport has bound its listener.
    pub fn server_binding(transport: &str, address: &str) {
        tracing::info!(event = "server_binding", transport = %transport, address = %address, "transport bound");
    }

    /// Emitted whenever the readiness monitor's observed state changes.
    pub fn readiness_changed(serving: bool) {
        tracing::info!(event = "readiness_changed", serving = serving, "readiness state changed");
    }

    /// Emitted on receipt of a termination signal, before teardown begins.
    pub fn shutdown_begin(signal: &str) {
        tracing::info!(event = "shutdown_begin", signal = %signal, "graceful shutdown beginning");
    }

    /// Emitted once teardown has completed.
    pub fn server_shutdown() {
        tracing::info!(event = "server_shutdown", "server shut down");
    }

    /// Emitted when a second termination signal forces an immediate exit.
    pub fn hard_exit(signal: &str) {
        tracing::warn!(event = "hard_exit", signal = %signal, "second signal received, exiting immediately");
    }
}

/// Session cache events, gated behind cache-verbose logging.
pub mod cache {
    pub fn hit(key: &str) {
        tracing::debug!(event = "cache_hit", key = %key, "cache hit");
    }

    pub fn miss(key: &str) {
        tracing::debug!(event = "cache_miss", key = %key, "cache miss");
    }

    pub fn load_complete(key: &str, duration_ms: u64) {
        tracing::info!(event = "cache_load_complete", key = %key, duration_ms = duration_ms, "model session loaded");
    }

    pub fn evict(key: &str) {
        tracing::debug!(event = "cache_evict", key = %key, "cache entry evicted");
    }

    pub fn expired(key: &str) {
        tracing::debug!(event = "cache_expired", key = %key, "cache entry expired");
    }
}

/// Per-request predict events, emitted by both transports at their
/// translation boundary.
pub mod predict {
    /// Emitted once a predict call completes, successfully or not.
    #[allow(clippy::too_many_arguments)]
    pub fn complete(
        request_id: &str,
        transport: &str,
        model: &str,
        status: &str,
        input_dtype: &str,
        input_shape: &str,
        output_shape: &str,
        duration_ms: u64,
        request_bytes: usize,
        response_bytes: usize,
    ) {
        tracing::info!(
            event = "predict_complete",
            canonical = true,
            timestamp_ms = super::now_ms(),
            request_id = %request_id,
            transport = %transport,
            model = %model,
            status = %status,
            input_dtype = %input_dtype,
            input_shape = %input_shape,
            output_shape = %output_shape,
            duration_ms = duration_ms,
            request_bytes = request_bytes,
            response_bytes = response_bytes,
            "predict complete"
        );
    }
}

/// A request-scoped timer, started when a transport handler begins and
/// consumed when it emits the canonical `predict_complete` line.
#[derive(Debug)]
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Error events not tied to one particular request.
pub mod errors {
    pub fn model_load_failed(key: &str, error: &str) {
        tracing::error!(event = "model_load_failed", key = %key, error = %error, "model load failed");
    }

    pub fn readiness_probe_failed(error: &str) {
        tracing::warn!(event = "readiness_probe_failed", error = %error, "readiness probe failed");
    }

    pub fn config_invalid(error: &str) {
        tracing::error!(event = "config_invalid", error = %error, "configuration invalid");
    }
}
