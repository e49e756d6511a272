pub mod error;
pub mod rate_limit;
pub mod rest;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    routing::{get, patch, post},
    Router,
};
use launchpad_common::Shutdown;
use launchpad_social::SocialService;
use launchpad_store::DocumentStore;
use launchpad_sync::SyncScheduler;
use tower_http::set_header::SetResponseHeaderLayer;

use rate_limit::RateLimiter;

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub social: SocialService,
    pub scheduler: SyncScheduler,
    pub sync_limiter: Arc<dyn RateLimiter>,
    pub shutdown: Shutdown,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Entities
        .route("/api/{kind}", get(rest::api_list_entities))
        .route("/api/{kind}/{record_id}", get(rest::api_entity_detail))
        // Event social state
        .route("/api/events/{record_id}/toggle-interest", patch(rest::events::toggle_interest))
        .route("/api/events/{record_id}/add-comment", patch(rest::events::add_comment))
        .route("/api/events/{record_id}/delete-comment", patch(rest::events::delete_comment))
        .route("/api/events/{record_id}/toggle-like-comment", patch(rest::events::toggle_like_comment))
        .route("/api/events/{record_id}/add-reply", patch(rest::events::add_reply))
        .route("/api/events/{record_id}/delete-reply", patch(rest::events::delete_reply))
        .route("/api/events/{record_id}/toggle-like-reply", patch(rest::events::toggle_like_reply))
        // Accounts
        .route("/api/accounts", post(rest::accounts::create_account))
        .route(
            "/api/accounts/{uid}",
            get(rest::accounts::get_account)
                .put(rest::accounts::update_account)
                .delete(rest::accounts::delete_account),
        )
        // Operator
        .route("/api/sync", post(rest::sync::trigger_sync))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Method and path only; no query strings or client addresses.
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
