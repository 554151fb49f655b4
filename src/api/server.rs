//! Sheet splitter HTTP server
//!
//! Axum server exposing upload, split and health endpoints over a shared
//! session registry.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::handlers;
use crate::excel::MAX_SHEETS_PER_REQUEST;
use crate::session::{SessionRegistry, SweepReport, DEFAULT_MAX_AGE};

/// Largest accepted upload.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 30 * 1024 * 1024;

/// Multipart framing allowance on top of the upload cap.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// API Server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Parent of every upload staging directory.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub max_sheets: usize,
    pub session_max_age: Duration,
    /// Soft wall-clock budget for one split.
    pub split_budget: Duration,
    /// Period of the background sweep; `None` leaves eviction to split requests.
    pub sweep_interval: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            upload_dir: std::env::temp_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_sheets: MAX_SHEETS_PER_REQUEST,
            session_max_age: DEFAULT_MAX_AGE,
            split_budget: Duration::from_secs(30),
            sweep_interval: None,
        }
    }
}

/// Shared application state
#[derive(Debug)]
pub struct AppState {
    pub version: String,
    pub config: ApiConfig,
    pub registry: SessionRegistry,
}

impl AppState {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            registry: SessionRegistry::new(config.upload_dir.clone()),
            config,
        }
    }

    /// Evict expired sessions on the blocking pool; storage removal touches disk.
    pub async fn sweep_sessions(self: &Arc<Self>) -> Option<SweepReport> {
        let state = Arc::clone(self);
        let task =
            tokio::task::spawn_blocking(move || state.registry.sweep(state.config.session_max_age));
        match task.await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Session sweep failed");
                None
            }
        }
    }
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes + BODY_LIMIT_SLACK;

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health))
        .route("/api/upload", post(handlers::upload))
        .route("/api/split", post(handlers::split))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server
pub async fn run_api_server(config: ApiConfig) -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheet_splitter=info,tower_http=info".into()),
        )
        .init();

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = Arc::new(AppState::new(config));

    if let Some(period) = state.config.sweep_interval {
        spawn_sweeper(Arc::clone(&state), period);
    }

    let app = build_router(Arc::clone(&state));

    info!("📑 Sheet Splitter starting on http://{}", addr);
    info!("   Endpoints: /api/upload, /api/split, /api/health");
    info!(
        "   Limits: {} MiB per upload, {} sheets per split, sessions kept {}s",
        state.config.max_upload_bytes / (1024 * 1024),
        state.config.max_sheets,
        state.config.session_max_age.as_secs()
    );
    info!("   Uploads: {}", state.config.upload_dir.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Sheet Splitter shutdown complete");
    Ok(())
}

/// Periodic eviction alongside the per-split sweep.
fn spawn_sweeper(state: Arc<AppState>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            state.sweep_sessions().await;
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, stopping server...");
}
