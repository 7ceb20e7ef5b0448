mod routes;
mod logger;
mod config;
mod response;
mod error;
mod models;
mod middleware;
mod state;
mod repository;
mod handler;
mod service;
mod pipeline;

mod tracer;

use log::{info, warn};
use opentelemetry::global;
use opentelemetry::global::shutdown_tracer_provider;
use tokio::signal;
use crate::config::parameter;
use crate::logger::logger::setup_logger;
use config::settings::SETTINGS;
use crate::pipeline::liveness_pipeline::liveness_pipeline::LivenessPipeline;
use crate::repository::detection_log_repository::{create_pool, DetectionLogRepository};
use crate::routes::root::{root_routes, RouterState};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
use crate::tracer::tracer::init_tracer_provider;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[tokio::main]
async fn main() {
    // Setup logger
    parameter::init();
    setup_logger();
    let addr = format!("0.0.0.0:{}", SETTINGS.server.http_port);

    // Setup tracing
    let tracing_enabled = match SETTINGS.tracer_uri() {
        Some(uri) => {
            let tracer_provider = init_tracer_provider(uri, &SETTINGS.app.name)
                .unwrap_or_else(|e| panic!("Failed to initialize tracer provider: {}", e));
            global::set_tracer_provider(tracer_provider);
            true
        }
        None => {
            warn!("tracer uri not configured, spans will not be exported");
            false
        }
    };

    // Setup database
    let pool = create_pool(
        &SETTINGS.database.url,
        SETTINGS.database.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
    )
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to database: {}", e));
    let repository = DetectionLogRepository::new(pool);
    repository
        .migrate()
        .await
        .unwrap_or_else(|e| panic!("Failed to migrate detection log schema: {}", e));
    info!("completed initializing database");

    // Setup pipeline
    let liveness_pipeline = tokio::task::spawn_blocking(|| LivenessPipeline::new(&SETTINGS.detector))
        .await
        .unwrap_or_else(|e| panic!("Failed to join pipeline loader: {}", e))
        .unwrap_or_else(|e| panic!("Failed to init liveness pipeline: {}", e));
    info!(
        "completed initializing pipeline, model_loaded={} model={}",
        liveness_pipeline.model_loaded(),
        liveness_pipeline.model_name(),
    );

    tokio::fs::create_dir_all(&SETTINGS.server.upload_dir)
        .await
        .unwrap_or_else(|e| panic!("Failed to create upload directory: {}", e));

    // Init server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to create new listener: {}", e));
    info!("starting api server on {}", SETTINGS.server);
    let router_state = RouterState::new(liveness_pipeline, repository, &SETTINGS.server.upload_dir)
        .request_timeout(SETTINGS.server.request_timeout)
        .max_body_bytes(SETTINGS.server.max_body_bytes);

    axum::serve(listener, root_routes(router_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| panic!("Failed to start api server: {}", e));

    if tracing_enabled {
        shutdown_tracer_provider();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
