use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes that only need a valid token, whatever the caller's roles.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET /api/v1/users/me
        .route("/api/v1/users/me", get(handlers::get_me))
}

/// Reader Router Module
///
/// Read access to the catalogue plus attendance, for `ROLE_ADMIN` or `ROLE_USER`.
pub fn reader_routes() -> Router<AppState> {
    Router::new()
        // --- Events ---
        // GET /api/v1/events?name=&page=&size=&sort=
        .route("/api/v1/events", get(handlers::list_events))
        .route("/api/v1/events/{id}", get(handlers::get_event))
        // POST/DELETE /api/v1/events/{id}/attendance
        // Registers or withdraws the caller as an attendee. Both are idempotent.
        .route(
            "/api/v1/events/{id}/attendance",
            post(handlers::attend_event).delete(handlers::unattend_event),
        )
        // --- Fetch strategy comparison ---
        // Same logical listing, three loading strategies. The round-trip count
        // is reported in the x-storage-round-trips header.
        .route("/api/v1/events/problematic", get(handlers::list_events_problematic))
        .route(
            "/api/v1/events/optimized-join-fetch",
            get(handlers::list_events_join_fetch),
        )
        .route(
            "/api/v1/events/optimized/all-details",
            get(handlers::list_events_all_details),
        )
        // --- Categories & Speakers ---
        .route("/api/v1/categories", get(handlers::list_categories))
        .route("/api/v1/categories/{id}", get(handlers::get_category))
        .route("/api/v1/speakers", get(handlers::list_speakers))
        .route("/api/v1/speakers/{id}", get(handlers::get_speaker))
}
