use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use mongodb::Client;
use onnx_infer_core::{CacheConfig, OrtSessionLoader, Orchestrator, RuntimeOptions, SessionCache};
use onnx_infer_server::{config::Config, lifecycle, logging, rpc, store};
use salvo::prelude::*;
use tokio::sync::watch;
use tonic::transport::Server as TonicServer;

/// Online inference service for deployed ONNX models.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    logging::lifecycle::server_startup(env!("CARGO_PKG_VERSION"));

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            logging::errors::config_invalid(&e.to_string());
            std::process::exit(1);
        }
    };
    logging::lifecycle::config_loaded(&config.json_bind, &config.grpc_bind);

    let mongo_client = Client::with_uri_str(&config.mongo_uri).await?;
    let metadata = Arc::new(store::MongoMetadataStore::new(mongo_client.clone(), &config.mongo_db));
    let blob = Arc::new(store::GridFsBlobStore::new(mongo_client, &config.mongo_db));
    let loader = Arc::new(OrtSessionLoader::new(RuntimeOptions {
        intra_threads: config.ort_intra_threads,
        inter_threads: config.ort_inter_threads,
    }));
    let cache = Arc::new(SessionCache::new(
        CacheConfig {
            capacity: config.cache_capacity,
            ttl: config.cache_ttl,
            verbose_logging: config.cache_verbose_logging,
        },
        blob,
        loader,
    ));
    let orchestrator = Arc::new(Orchestrator::new(metadata.clone(), cache));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ready = Arc::new(AtomicBool::new(false));

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_service_status("", tonic_health::ServingStatus::NotServing)
        .await;
    health_reporter
        .set_service_status(lifecycle::INFERENCE_SERVICE_NAME, tonic_health::ServingStatus::NotServing)
        .await;

    let readiness_task = tokio::spawn(lifecycle::run_readiness_monitor(
        metadata,
        health_reporter,
        config.readiness_interval,
        ready.clone(),
        shutdown_rx.clone(),
    ));

    let json_router = onnx_infer_server::api::router(orchestrator.clone(), ready);
    let json_acceptor = TcpListener::new(&config.json_bind).bind().await;
    logging::lifecycle::server_binding("json", &config.json_bind);
    let mut json_shutdown_rx = shutdown_rx.clone();
    let json_task = tokio::spawn(async move {
        Server::new(json_acceptor)
            .serve_with_graceful_shutdown(json_router, async move {
                let _ = json_shutdown_rx.changed().await;
            })
            .await;
    });
    // Salvo's graceful shutdown has no built-in grace timeout either; apply
    // the same bounded-wait-then-abort pattern used for the gRPC transport
    // below so a connection that never closes can't block shutdown forever.
    {
        let mut rx = shutdown_rx.clone();
        let grace = std::time::Duration::from_secs(config.grpc_grace_seconds);
        let abort = json_task.abort_handle();
        tokio::spawn(async move {
            let _ = rx.changed().await;
            tokio::time::sleep(grace).await;
            abort.abort();
        });
    }

    let inference_service =
        rpc::pb::inference_service_server::InferenceServiceServer::new(rpc::InferenceServiceImpl::new(orchestrator))
            .max_decoding_message_size(config.grpc_max_recv_bytes)
            .max_encoding_message_size(config.grpc_max_send_bytes);

    let mut grpc_builder = TonicServer::builder()
        .add_service(inference_service)
        .add_service(health_service);

    if config.enable_reflection {
        let reflection = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(rpc::FILE_DESCRIPTOR_SET)
            .build_v1()?;
        grpc_builder = grpc_builder.add_service(reflection);
    }

    logging::lifecycle::server_binding("rpc", &config.grpc_bind);
    let grpc_addr = config.grpc_bind.parse()?;
    let mut grpc_shutdown_rx = shutdown_rx.clone();
    let grpc_task = tokio::spawn(async move {
        let _ = grpc_builder
            .serve_with_shutdown(grpc_addr, async move {
                let _ = grpc_shutdown_rx.changed().await;
            })
            .await;
    });
    // If graceful shutdown hasn't drained in-flight calls within the grace
    // period, abort the task rather than waiting indefinitely.
    {
        let mut rx = shutdown_rx.clone();
        let grace = std::time::Duration::from_secs(config.grpc_grace_seconds);
        let abort = grpc_task.abort_handle();
        tokio::spawn(async move {
            let _ = rx.changed().await;
            tokio::time::sleep(grace).await;
            abort.abort();
        });
    }

    tokio::spawn(lifecycle::wait_for_shutdown_signal(shutdown_tx));

    let _ = tokio::join!(json_task, grpc_task, readiness_task);
    logging::lifecycle::server_shutdown();

    Ok(())
}
