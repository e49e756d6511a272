use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use tracing::{info, warn};

use crate::AppState;

/// Start a full sync in the background. Rate-limited; the cycle itself runs
/// after the response is sent. Refused with 409 while another cycle runs, and
/// such refusals do not count against the limit.
pub async fn trigger_sync(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(guard) = state.scheduler.try_claim() else {
        info!("Manual sync rejected, a cycle is already running");
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Sync already running" })),
        );
    };

    if !state.sync_limiter.try_acquire() {
        warn!("Manual sync rejected by rate limiter");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Sync rate limit exceeded" })),
        );
    }

    let scheduler = state.scheduler.clone();
    let mut shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        let summary = scheduler.run_cycle(guard, &mut shutdown).await;
        info!(enriched = summary.enriched(), "Manual sync finished");
    });

    info!("Manual sync started");
    (StatusCode::ACCEPTED, Json(json!({ "status": "started" })))
}
