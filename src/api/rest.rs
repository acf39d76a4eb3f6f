// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All REST endpoints live under `/api/v1/`; the WebSocket feed is mounted at
// `/ws`. Everything is public: the relay serves read-only market data to
// browsers, so there is nothing to authenticate.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::app_state::AppState;
use crate::market_data::Timeframe;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Health ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        // ── Market data ─────────────────────────────────────────────
        .route("/api/v1/coins/:mint/history", get(coin_history))
        .route("/api/v1/coins/:mint/candles", get(coin_candles))
        // ── WebSocket (handled in ws module but mounted here) ───────
        .route("/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ──────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
    uptime_secs: u64,
    clients: usize,
    tracked_mints: usize,
    upstream_connected: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        server_time: chrono::Utc::now().timestamp_millis(),
        uptime_secs: state.uptime_secs(),
        clients: state.broker.client_count(),
        tracked_mints: state.broker.tracked_mints(),
        upstream_connected: state.broker.upstream_connected(),
    };
    Json(resp)
}

// =============================================================================
// Price history
// =============================================================================

/// Market-cap points for one mint, oldest first. An untracked mint yields an
/// empty array rather than a 404 so chart frontends need no special casing.
async fn coin_history(
    State(state): State<Arc<AppState>>,
    Path(mint): Path<String>,
) -> impl IntoResponse {
    Json(state.broker.price_history(&mint))
}

// =============================================================================
// Candles
// =============================================================================

#[derive(Deserialize)]
struct CandleQuery {
    tf: Option<String>,
}

/// OHLC series for one mint at one timeframe (`?tf=1m`, default `1m`).
async fn coin_candles(
    State(state): State<Arc<AppState>>,
    Path(mint): Path<String>,
    Query(query): Query<CandleQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let label = query.tf.unwrap_or_else(|| "1m".to_string());
    let tf = match Timeframe::parse(&label) {
        Some(tf) => tf,
        None => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": format!("Invalid timeframe: '{label}'. Use '1m', '5m', '15m' or '1h'."),
                })),
            ));
        }
    };

    Ok(Json(state.broker.candle_history(&mint, tf)))
}
