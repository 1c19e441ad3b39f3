use crate::{
    AppState,
    auth::AuthUser,
    domain::Id,
    error::{ApiError, ErrorBody},
    extract::{ApiJson, ApiPath, ApiQuery},
    models::{
        AuthResponse, CategoryRequest, CategoryResponse, EventDetailsResponse, EventPageQuery,
        EventRequest, EventResponse, LoginRequest, RegisterRequest, SpeakerRequest,
        SpeakerResponse, UserResponse,
    },
    pagination::Page,
    services::{
        self,
        event::{FetchStrategy, StrategyListing},
    },
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

/// Response header carrying the number of storage round trips a strategy listing cost.
pub const ROUND_TRIPS_HEADER: &str = "x-storage-round-trips";

fn strategy_response(listing: StrategyListing) -> impl IntoResponse {
    (
        [(ROUND_TRIPS_HEADER, listing.round_trips.to_string())],
        Json(listing.events),
    )
}

// --- Auth ---

/// login
///
/// [Public Route] Exchanges username and password for a bearer token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = AuthResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 401, description = "Bad credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let token = services::auth::login(state.repo.as_ref(), &state.config, &payload).await?;
    Ok(Json(token))
}

/// register
///
/// [Public Route] Creates an account. Roles default to `ROLE_USER`.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Validation failed or username/email taken", body = ErrorBody),
        (status = 404, description = "Unknown role", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = services::auth::register(state.repo.as_ref(), &payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// get_me
///
/// [Authenticated Route] Profile of the caller with roles and attended events.
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn get_me(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    Ok(Json(services::auth::profile(state.repo.as_ref(), &user).await?))
}

// --- Events ---

/// list_events
///
/// [Reader Route] Paginated listing with an optional case-insensitive name filter.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "events",
    security(("bearer_auth" = [])),
    params(EventPageQuery),
    responses(
        (status = 200, description = "One page of events", body = Page<EventResponse>),
        (status = 400, description = "Unknown sort field", body = ErrorBody)
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EventPageQuery>,
) -> Result<Json<Page<EventResponse>>, ApiError> {
    tracing::info!("GET /events (name: {:?})", query.name);
    Ok(Json(services::event::find_page(state.repo.as_ref(), &query).await?))
}

/// get_event
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "events",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event", body = EventResponse),
        (status = 404, description = "No such event", body = ErrorBody)
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Id>,
) -> Result<Json<EventResponse>, ApiError> {
    Ok(Json(services::event::find_by_id(state.repo.as_ref(), id).await?))
}

/// create_event
///
/// [Admin Route] Creates an event. Category and speakers must exist.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "events",
    security(("bearer_auth" = [])),
    request_body = EventRequest,
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 404, description = "Unknown category or speaker", body = ErrorBody)
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<EventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), ApiError> {
    tracing::info!("POST /events: '{}'", payload.name);
    let event = services::event::create(state.repo.as_ref(), &payload).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// update_event
///
/// [Admin Route] Replaces an event's fields and reconciles its speakers.
#[utoipa::path(
    put,
    path = "/api/v1/events/{id}",
    tag = "events",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Event id")),
    request_body = EventRequest,
    responses(
        (status = 200, description = "Event updated", body = EventResponse),
        (status = 404, description = "Unknown event, category or speaker", body = ErrorBody)
    )
)]
pub async fn update_event(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Id>,
    ApiJson(payload): ApiJson<EventRequest>,
) -> Result<Json<EventResponse>, ApiError> {
    Ok(Json(services::event::update(state.repo.as_ref(), id, &payload).await?))
}

/// delete_event
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}",
    tag = "events",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Event id")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 404, description = "No such event", body = ErrorBody)
    )
)]
pub async fn delete_event(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Id>,
) -> Result<StatusCode, ApiError> {
    services::event::delete_by_id(state.repo.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// attend_event
///
/// [Reader Route] Registers the caller as an attendee. Idempotent.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/attendance",
    tag = "events",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Event id")),
    responses(
        (status = 204, description = "Attendance recorded"),
        (status = 404, description = "No such event", body = ErrorBody)
    )
)]
pub async fn attend_event(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Id>,
) -> Result<StatusCode, ApiError> {
    services::event::attend(state.repo.as_ref(), id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// unattend_event
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}/attendance",
    tag = "events",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Event id")),
    responses(
        (status = 204, description = "Attendance removed"),
        (status = 404, description = "No such event", body = ErrorBody)
    )
)]
pub async fn unattend_event(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Id>,
) -> Result<StatusCode, ApiError> {
    services::event::unattend(state.repo.as_ref(), id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Fetch strategies ---

/// list_events_problematic
///
/// [Reader Route] Full listing loaded one association at a time (1 + 3N round trips).
#[utoipa::path(
    get,
    path = "/api/v1/events/problematic",
    tag = "fetch-strategies",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "All events with every association", body = [EventDetailsResponse]))
)]
pub async fn list_events_problematic(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("GET /events/problematic");
    let listing = services::event::list_with_strategy(state.repo.as_ref(), FetchStrategy::Naive).await?;
    Ok(strategy_response(listing))
}

/// list_events_join_fetch
///
/// [Reader Route] Full listing in one join over category and speakers. No attendees.
#[utoipa::path(
    get,
    path = "/api/v1/events/optimized-join-fetch",
    tag = "fetch-strategies",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "All events with category and speakers", body = [EventDetailsResponse]))
)]
pub async fn list_events_join_fetch(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("GET /events/optimized-join-fetch");
    let listing =
        services::event::list_with_strategy(state.repo.as_ref(), FetchStrategy::JoinFetch).await?;
    Ok(strategy_response(listing))
}

/// list_events_all_details
///
/// [Reader Route] Full listing in one join including attendees.
#[utoipa::path(
    get,
    path = "/api/v1/events/optimized/all-details",
    tag = "fetch-strategies",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "All events with every association", body = [EventDetailsResponse]))
)]
pub async fn list_events_all_details(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("GET /events/optimized/all-details");
    let listing =
        services::event::list_with_strategy(state.repo.as_ref(), FetchStrategy::EntityGraph).await?;
    Ok(strategy_response(listing))
}

// --- Categories ---

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "All categories", body = [CategoryResponse]))
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    Ok(Json(services::category::find_all(state.repo.as_ref()).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category", body = CategoryResponse),
        (status = 404, description = "No such category", body = ErrorBody)
    )
)]
pub async fn get_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Id>,
) -> Result<Json<CategoryResponse>, ApiError> {
    Ok(Json(services::category::find_by_id(state.repo.as_ref(), id).await?))
}

/// create_category
///
/// [Admin Route] Duplicate names are answered with 409.
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 409, description = "Name already used", body = ErrorBody)
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    let category = services::category::create(state.repo.as_ref(), &payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Category id")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 404, description = "No such category", body = ErrorBody)
    )
)]
pub async fn update_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Id>,
    ApiJson(payload): ApiJson<CategoryRequest>,
) -> Result<Json<CategoryResponse>, ApiError> {
    Ok(Json(services::category::update(state.repo.as_ref(), id, &payload).await?))
}

/// delete_category
///
/// [Admin Route] A category still used by events is answered with 409.
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "No such category", body = ErrorBody),
        (status = 409, description = "Category still referenced", body = ErrorBody)
    )
)]
pub async fn delete_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Id>,
) -> Result<StatusCode, ApiError> {
    services::category::delete_by_id(state.repo.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Speakers ---

#[utoipa::path(
    get,
    path = "/api/v1/speakers",
    tag = "speakers",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "All speakers", body = [SpeakerResponse]))
)]
pub async fn list_speakers(
    State(state): State<AppState>,
) -> Result<Json<Vec<SpeakerResponse>>, ApiError> {
    Ok(Json(services::speaker::find_all(state.repo.as_ref()).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/speakers/{id}",
    tag = "speakers",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Speaker id")),
    responses(
        (status = 200, description = "Speaker", body = SpeakerResponse),
        (status = 404, description = "No such speaker", body = ErrorBody)
    )
)]
pub async fn get_speaker(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Id>,
) -> Result<Json<SpeakerResponse>, ApiError> {
    Ok(Json(services::speaker::find_by_id(state.repo.as_ref(), id).await?))
}

/// create_speaker
///
/// [Admin Route] Duplicate emails are answered with 409.
#[utoipa::path(
    post,
    path = "/api/v1/speakers",
    tag = "speakers",
    security(("bearer_auth" = [])),
    request_body = SpeakerRequest,
    responses(
        (status = 201, description = "Speaker created", body = SpeakerResponse),
        (status = 409, description = "Email already used", body = ErrorBody)
    )
)]
pub async fn create_speaker(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SpeakerRequest>,
) -> Result<(StatusCode, Json<SpeakerResponse>), ApiError> {
    let speaker = services::speaker::create(state.repo.as_ref(), &payload).await?;
    Ok((StatusCode::CREATED, Json(speaker)))
}

#[utoipa::path(
    put,
    path = "/api/v1/speakers/{id}",
    tag = "speakers",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Speaker id")),
    request_body = SpeakerRequest,
    responses(
        (status = 200, description = "Speaker updated", body = SpeakerResponse),
        (status = 404, description = "No such speaker", body = ErrorBody)
    )
)]
pub async fn update_speaker(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Id>,
    ApiJson(payload): ApiJson<SpeakerRequest>,
) -> Result<Json<SpeakerResponse>, ApiError> {
    Ok(Json(services::speaker::update(state.repo.as_ref(), id, &payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/speakers/{id}",
    tag = "speakers",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Speaker id")),
    responses(
        (status = 204, description = "Speaker deleted"),
        (status = 404, description = "No such speaker", body = ErrorBody),
        (status = 409, description = "Speaker still linked to events", body = ErrorBody)
    )
)]
pub async fn delete_speaker(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Id>,
) -> Result<StatusCode, ApiError> {
    services::speaker::delete_by_id(state.repo.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
