//! HTTP surface for keypoint analysis.
//!
//! Callers run pose estimation themselves and post keypoint frames:
//! - `POST /analyze_frames?activity=squat` with a JSON array of sampled frames
//! - `POST /analyze_frame?activity=squat` with one live frame
//!
//! Video upload and decoding are not handled here.

use crate::config::{Config, ConfigError};
use crate::core::{ActivityRegistry, AnalysisSession, BatchReport, LiveReport, SessionSettings};
use crate::pose::KeypointFrame;
use crate::stats::{create_shared_stats, SharedStats, StatsSnapshot};
use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Default request body cap: room for roughly an hour of sampled frames at
/// 30 fps with stride 5.
pub const DEFAULT_BODY_LIMIT: usize = 256 * 1024 * 1024;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Activity used when a request names none
    pub default_activity: String,
    pub settings: SessionSettings,
    pub registry: ActivityRegistry,
    /// Largest accepted request body in bytes
    pub body_limit: usize,
}

impl ServerConfig {
    /// Create a server configuration with built-in activities and default settings.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            default_activity: "squat".to_string(),
            settings: SessionSettings::default(),
            registry: ActivityRegistry::with_builtins(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Derive a server configuration from the engine configuration.
    pub fn from_config(port: u16, config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            port,
            default_activity: config.default_activity.clone(),
            settings: config.session_settings()?,
            registry: config.registry()?,
            body_limit: DEFAULT_BODY_LIMIT,
        })
    }
}

/// Shared server state
struct ServerState {
    config: ServerConfig,
    stats: SharedStats,
}

impl ServerState {
    fn session(&self, activity: Option<&str>) -> Result<AnalysisSession, ApiError> {
        let activity = activity.unwrap_or(&self.config.default_activity);
        AnalysisSession::new(&self.config.registry, activity, self.config.settings)
            .map(|s| s.with_stats(self.stats.clone()))
            .map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: e.to_string(),
                        code: "UNKNOWN_ACTIVITY".to_string(),
                    }),
                )
            })
    }
}

/// Query parameters shared by the analysis endpoints
#[derive(Debug, Deserialize)]
pub struct AnalyzeParams {
    pub activity: Option<String>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /activities
async fn activities(State(state): State<Arc<ServerState>>) -> Json<Vec<String>> {
    Json(state.config.registry.activities())
}

/// GET /stats
async fn stats(State(state): State<Arc<ServerState>>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

/// POST /analyze_frames
async fn analyze_frames(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<AnalyzeParams>,
    Json(frames): Json<Vec<KeypointFrame>>,
) -> Result<Json<BatchReport>, ApiError> {
    let session = state.session(params.activity.as_deref())?;

    let report = tokio::task::spawn_blocking(move || session.analyze_batch(&frames))
        .await
        .map_err(|e| {
            tracing::error!("Batch analysis task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Analysis failed: {e}"),
                    code: "ANALYSIS_ERROR".to_string(),
                }),
            )
        })?;

    Ok(Json(report))
}

/// POST /analyze_frame
async fn analyze_frame(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<AnalyzeParams>,
    Json(frame): Json<KeypointFrame>,
) -> Result<Json<LiveReport>, ApiError> {
    let session = state.session(params.activity.as_deref())?;
    Ok(Json(session.analyze_live(&frame)))
}

/// Build the router without binding a socket.
pub fn router(config: ServerConfig) -> Router {
    let body_limit = config.body_limit;
    let state = Arc::new(ServerState {
        config,
        stats: create_shared_stats(),
    });

    Router::new()
        .route("/health", get(health))
        .route("/activities", get(activities))
        .route("/stats", get(stats))
        .route("/analyze_frames", post(analyze_frames))
        .route("/analyze_frame", post(analyze_frame))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let app = router(config);

    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Posture analysis server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
