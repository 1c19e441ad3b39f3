use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and monitoring.
        .route("/health", get(|| async { "ok" }))
        // POST /api/v1/auth/login
        // Exchanges credentials for a bearer token.
        .route("/api/v1/auth/login", post(handlers::login))
        // POST /api/v1/auth/register
        // Creates an account with ROLE_USER unless roles are given.
        .route("/api/v1/auth/register", post(handlers::register))
}
