//! The lifecycle controller (C8): readiness monitoring driven by metadata
//! store liveness, and two-phase graceful shutdown shared by both
//! transports.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use onnx_infer_core::MetadataStore;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tonic_health::server::HealthReporter;

use crate::logging;

/// Fully-qualified service name the health reporter tracks alongside the
/// empty string (overall process health); both move together.
pub const INFERENCE_SERVICE_NAME: &str = "inference.InferenceService";

/// Periodically pings the metadata store and mirrors its liveness into the
/// health-check service used by both the JSON `/readyz` route and the gRPC
/// health service.
pub async fn run_readiness_monitor(
    metadata: Arc<dyn MetadataStore>,
    health: HealthReporter,
    interval: Duration,
    ready: Arc<AtomicBool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut prev: Option<bool> = None;
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
                continue;
            }
        }

        let serving = match metadata.ping().await {
            Ok(()) => true,
            Err(e) => {
                logging::errors::readiness_probe_failed(&e.to_string());
                false
            }
        };

        if prev != Some(serving) {
            logging::lifecycle::readiness_changed(serving);
            prev = Some(serving);
        }

        ready.store(serving, Ordering::SeqCst);
        use tonic_health::ServingStatus;
        let status = if serving {
            ServingStatus::Serving
        } else {
            ServingStatus::NotServing
        };
        health.set_service_status("", status).await;
        health.set_service_status(INFERENCE_SERVICE_NAME, status).await;
    }
}

/// Waits for the first SIGTERM/SIGINT, flips `shutdown` to signal both
/// transports to begin a graceful stop, then waits for a second signal to
/// force an immediate, uncoordinated exit.
pub async fn wait_for_shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    let first = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    logging::lifecycle::shutdown_begin(first);
    let _ = shutdown_tx.send(true);

    let second = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    logging::lifecycle::hard_exit(second);
    std::process::exit(1);
}
