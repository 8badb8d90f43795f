use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::convert_routes::convert_pdf;
use super::metrics::metrics_handler;
use super::{log_requests, state::*, ServerConfig};
use crate::conversion::PdfConverter;

pub const FEATURES: [&str; 2] = ["file_upload", "url_download"];

#[derive(Serialize)]
struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub features: [&'static str; 2],
    pub uptime: String,
    pub commit: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

fn service_title() -> String {
    format!(
        "PDF2JPG Service v{}.{}",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR")
    )
}

async fn home() -> impl IntoResponse {
    Json(json!({
        "message": service_title(),
        "endpoints": {
            "/convert/": "POST - Convert PDF to JPG images",
            "/health": "GET - Health check"
        },
        "usage": {
            "file_upload": "Send PDF file as 'pdf' in multipart/form-data",
            "url_download": "Send PDF URL as 'pdf_url' in form data"
        }
    }))
}

async fn health(State(state): State<ServerState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        features: FEATURES,
        uptime: format_uptime(state.start_time.elapsed()),
        commit: state.hash.clone(),
    })
}

impl ServerState {
    fn new(config: ServerConfig, converter: GuardedConverter) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            converter,
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

pub fn make_app(config: ServerConfig, converter: Arc<PdfConverter>) -> Router {
    let state = ServerState::new(config.clone(), converter);

    let convert_routes: Router = Router::new()
        .route("/convert/", post(convert_pdf))
        .route("/convert", post(convert_pdf))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state.clone());

    let info_routes: Router = Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .with_state(state.clone());

    info_routes
        .merge(convert_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

async fn serve(listener: TcpListener, app: Router, shutdown: CancellationToken) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// Resolves with the signal's name on Ctrl+C or, on unix, SIGTERM.
///
/// Handlers are installed before this returns, so a signal arriving before the
/// future is first polled is not lost.
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = &'static str>> {
    #[cfg(unix)]
    let terminate = {
        let mut stream =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        async move {
            stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    Ok(async move {
        tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => "Ctrl+C",
            _ = terminate => "SIGTERM",
        }
    })
}

/// Serves the API on `host:config.port` and metrics on `host:metrics_port` until `shutdown`.
pub async fn run_server(
    config: ServerConfig,
    host: &str,
    metrics_port: u16,
    converter: Arc<PdfConverter>,
    shutdown: CancellationToken,
) -> Result<()> {
    let address = format!("{}:{}", host, config.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    let metrics_address = format!("{}:{}", host, metrics_port);
    let metrics_listener = TcpListener::bind(&metrics_address)
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_address))?;

    let metrics_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = serve(metrics_listener, make_metrics_app(), metrics_shutdown).await {
            error!("Metrics server failed: {:?}", e);
        }
    });

    info!("Listening on {}", address);
    serve(listener, make_app(config, converter), shutdown).await
}
