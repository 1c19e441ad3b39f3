use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Admin Router Module
///
/// Every mutation of events, categories and speakers. The router is wrapped
/// in the admin guard, which answers 401 without a valid token and 403 when
/// the caller lacks `ROLE_ADMIN`.
///
/// Paths overlap with the reader routes; axum merges them per method.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/events", post(handlers::create_event))
        .route(
            "/api/v1/events/{id}",
            put(handlers::update_event).delete(handlers::delete_event),
        )
        .route("/api/v1/categories", post(handlers::create_category))
        .route(
            "/api/v1/categories/{id}",
            put(handlers::update_category).delete(handlers::delete_category),
        )
        .route("/api/v1/speakers", post(handlers::create_speaker))
        .route(
            "/api/v1/speakers/{id}",
            put(handlers::update_speaker).delete(handlers::delete_speaker),
        )
}
