// Public API for integration tests and the server binary

pub mod api;
pub mod auth;
pub mod command;
pub mod config;
pub mod error;
pub mod sms;
pub mod state;
pub mod twiml;
pub mod types;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use auth::ApiKeyConfig;
use state::AppState;

/// Build the HTTP router
pub fn app(state: Arc<AppState>, api_key: Arc<ApiKeyConfig>) -> Router {
    // Only the gateway webhook is behind the shared key
    let sms_routes = Router::new()
        .route("/sms", post(api::sms_webhook))
        .layer(middleware::from_fn_with_state(
            api_key,
            auth::sms_auth_middleware,
        ));

    Router::new()
        .route("/", get(api::index))
        .route("/poll-results", get(api::poll_results))
        .route("/api/poll", get(api::poll_status))
        .merge(sms_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
