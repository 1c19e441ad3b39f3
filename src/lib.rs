use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod mapper;
pub mod memory;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod seed;
pub mod services;
pub mod validation;

// Routing segregated by access level (public, authenticated/reader, admin).
pub mod routes;
use auth::{AdminUser, AuthUser, ReaderUser};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use memory::InMemoryRepository;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document aggregated from every `#[utoipa::path]` handler and
/// `ToSchema` model. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::register, handlers::get_me,
        handlers::list_events, handlers::get_event, handlers::create_event,
        handlers::update_event, handlers::delete_event, handlers::attend_event,
        handlers::unattend_event, handlers::list_events_problematic,
        handlers::list_events_join_fetch, handlers::list_events_all_details,
        handlers::list_categories, handlers::get_category, handlers::create_category,
        handlers::update_category, handlers::delete_category,
        handlers::list_speakers, handlers::get_speaker, handlers::create_speaker,
        handlers::update_speaker, handlers::delete_speaker
    ),
    components(
        schemas(
            models::EventRequest, models::SpeakerRequest, models::CategoryRequest,
            models::LoginRequest, models::RegisterRequest, models::CategoryResponse,
            models::SpeakerResponse, models::EventResponse, models::AttendeeResponse,
            models::EventDetailsResponse, models::EventSummary, models::UserResponse,
            models::AuthResponse, error::ErrorBody,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "events", description = "Event catalogue and attendance"),
        (name = "fetch-strategies", description = "Full listings loaded with different strategies"),
        (name = "categories", description = "Event categories"),
        (name = "speakers", description = "Event speakers"),
        (name = "auth", description = "Login and registration"),
        (name = "users", description = "Account profile")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by the protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single, cloneable container shared by every request: the persistence
/// layer behind a trait object and the immutable configuration.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless `AuthUser` resolves. The resolved user
/// is stored in the request extensions so handlers do not decode the token again.
async fn auth_middleware(user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(user);
    next.run(request).await
}

/// reader_middleware
///
/// 401 without a valid token, 403 without `ROLE_ADMIN` or `ROLE_USER`.
async fn reader_middleware(ReaderUser(user): ReaderUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(user);
    next.run(request).await
}

/// admin_middleware
///
/// 401 without a valid token, 403 without `ROLE_ADMIN`.
async fn admin_middleware(AdminUser(user): AdminUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(user);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree, applies the access guards per route group and
/// the global observability layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            authenticated::reader_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), reader_middleware)),
        )
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), admin_middleware)),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for every request, carrying method, URI and the `x-request-id` set
/// by `SetRequestIdLayer` so all log lines of one request correlate.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
