//! HTTP server exposing station telemetry to the browser dashboard.
//!
//! Routes:
//!   GET /, /index.html          → landing page
//!   GET /app.js, /style.css     → client assets
//!   GET /system                 → host health JSON
//!   GET /latest[?date=]         → live station state JSON
//!   GET /latest/image[?date=]   → most recent captured frame
//!   GET /previous[?date=]       → finalized capture summary JSON
//!   GET /previous/radiants[?date=] → radiants plot
//!   GET /previous/image[?date=] → stacked-detections frame
//!   GET /previous/dates         → YYYYMMDD dates of finalized captures
//!   GET /network                → external meteor-network stats (nullable)
//!
//! Handlers are stateless: each call re-reads the filesystem, so concurrent
//! requests need no coordination.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use skywatch_common::state::{CaptureSummary, StationState};

use crate::artifacts;
use crate::network::NetworkClient;
use crate::system;
use crate::telemetry::{Telemetry, TelemetryError};

const INDEX_HTML: &str = include_str!("../assets/index.html");
const APP_JS: &str = include_str!("../assets/app.js");
const STYLE_CSS: &str = include_str!("../assets/style.css");

/// Shared state for route handlers.
#[derive(Clone)]
struct AppState {
    telemetry: Telemetry,
    network: NetworkClient,
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<String>,
}

/// Build the application router.  Split out from [`run`] so tests can drive
/// it without binding a socket.
pub fn router(log_dir: PathBuf) -> Router {
    let state = AppState {
        telemetry: Telemetry::new(log_dir),
        network: NetworkClient::new(),
    };

    Router::new()
        .route("/", get(index))
        .route("/index.html", get(index))
        .route("/app.js", get(app_js))
        .route("/style.css", get(style_css))
        .route("/system", get(system_status))
        .route("/latest", get(latest))
        .route("/latest/image", get(latest_image))
        .route("/previous", get(previous))
        .route("/previous/dates", get(previous_dates))
        .route("/previous/radiants", get(previous_radiants))
        .route("/previous/image", get(previous_image))
        .route("/network", get(network_stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server.  Blocks until `shutdown` is set.
pub async fn run(
    log_dir: PathBuf,
    listen_addr: &str,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let app = router(log_dir);

    let listener = TcpListener::bind(listen_addr).await?;
    info!("Telemetry server listening on {listen_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
            }
        })
        .await?;

    Ok(())
}

// ── error mapping ────────────────────────────────────────────────────────

/// Maps the reader's error taxonomy onto HTTP statuses.  No failure here is
/// fatal to the process; each request fails on its own.
struct ApiError(TelemetryError);

impl From<TelemetryError> for ApiError {
    fn from(err: TelemetryError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            TelemetryError::DataUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "loading"})),
            )
                .into_response(),
            TelemetryError::NotFound => {
                (StatusCode::NOT_FOUND, "no capture record found").into_response()
            }
            err => {
                error!("Request failed: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

// ── route handlers ───────────────────────────────────────────────────────

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn app_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], APP_JS)
}

async fn style_css() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css")], STYLE_CSS)
}

async fn system_status(State(state): State<AppState>) -> Json<system::SystemStatus> {
    Json(system::snapshot(state.telemetry.log_dir()))
}

async fn latest(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<StationState>, ApiError> {
    Ok(Json(state.telemetry.latest(query.date.as_deref())?))
}

async fn latest_image(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Response, ApiError> {
    let frame = artifacts::latest_frame(state.telemetry.log_dir(), query.date.as_deref(), false);
    match frame {
        Some(path) => serve_file(path).await,
        None => Ok((StatusCode::NOT_FOUND, "Capture is not active").into_response()),
    }
}

async fn previous(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<CaptureSummary>, ApiError> {
    Ok(Json(state.telemetry.previous(query.date.as_deref())?))
}

async fn previous_dates(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.telemetry.history()?))
}

async fn previous_radiants(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Response, ApiError> {
    let plot = artifacts::radiants_plot(state.telemetry.log_dir(), query.date.as_deref());
    match plot {
        Some(path) => serve_file(path).await,
        None => Err(ApiError(TelemetryError::NotFound)),
    }
}

async fn previous_image(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Response, ApiError> {
    let frame = artifacts::latest_frame(state.telemetry.log_dir(), query.date.as_deref(), true);
    match frame {
        Some(path) => serve_file(path).await,
        None => Err(ApiError(TelemetryError::NotFound)),
    }
}

async fn network_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.network.stats().await)
}

/// Stream an artifact file unchanged, with its content type and mtime.
async fn serve_file(path: PathBuf) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(TelemetryError::from)?;
    let headers = [
        (header::CONTENT_TYPE, artifacts::content_type(&path).to_string()),
        (header::LAST_MODIFIED, artifacts::last_modified(&path)),
    ];
    Ok((headers, Body::from(bytes)).into_response())
}
