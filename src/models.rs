use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

use crate::domain::Id;

// --- Request Payloads (Input Schemas) ---

/// EventRequest
///
/// Payload for creating (POST /events) and replacing (PUT /events/{id}) an event.
/// Required fields are optional at the serde level so that missing values surface
/// as field-level validation messages instead of a generic parse error.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EventRequest {
    #[serde(default)]
    #[schema(example = "Conferencia de Rust")]
    pub name: String,
    #[schema(value_type = String, format = Date, example = "2025-03-01")]
    #[ts(type = "string | null")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    #[schema(example = "Sala 3")]
    pub location: String,
    pub category_id: Option<Id>,
    /// Target speaker set. Missing or empty clears the event's speakers on update.
    pub speakers_ids: Option<BTreeSet<Id>>,
}

/// SpeakerRequest
///
/// Payload for creating and updating speakers.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SpeakerRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    #[schema(example = "jane.smith@example.com")]
    pub email: String,
    pub bio: Option<String>,
}

/// CategoryRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// RegisterRequest
///
/// Public registration payload. When `roles` is omitted the account receives
/// `ROLE_USER`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub roles: Option<BTreeSet<String>>,
}

/// EventPageQuery
///
/// Query parameters for the paginated listing (GET /events).
#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct EventPageQuery {
    /// Case-insensitive substring of the event name.
    pub name: Option<String>,
    /// Zero-based page number (default 0).
    pub page: Option<u32>,
    /// Page size (default 10, max 100).
    pub size: Option<u32>,
    /// `field` or `field,asc|desc` where field is id, name, date or location (default `name`).
    pub sort: Option<String>,
}

// --- Response Schemas (Output) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryResponse {
    pub id: Id,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SpeakerResponse {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
}

/// EventResponse
///
/// Flat event shape used by CRUD and paginated endpoints: the category is
/// collapsed to its id and name.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EventResponse {
    pub id: Id,
    pub name: String,
    #[schema(value_type = String, format = Date)]
    #[ts(type = "string")]
    pub date: NaiveDate,
    pub location: String,
    pub category_id: Id,
    pub category_name: String,
    pub speakers: Vec<SpeakerResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AttendeeResponse {
    pub id: Id,
    pub username: String,
    pub name: String,
}

/// EventDetailsResponse
///
/// Full object graph returned by the fetch-strategy endpoints. `attendedUsers`
/// is omitted entirely when the strategy did not load attendees.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EventDetailsResponse {
    pub id: Id,
    pub name: String,
    #[schema(value_type = String, format = Date)]
    #[ts(type = "string")]
    pub date: NaiveDate,
    pub location: String,
    pub category: CategoryResponse,
    pub speakers: Vec<SpeakerResponse>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[ts(optional)]
    pub attended_users: Option<Vec<AttendeeResponse>>,
}

/// EventSummary
///
/// Scalar-only view of an event, used inside user profiles.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EventSummary {
    pub id: Id,
    pub name: String,
    #[schema(value_type = String, format = Date)]
    #[ts(type = "string")]
    pub date: NaiveDate,
    pub location: String,
}

/// UserResponse
///
/// Public view of an account. The password hash never leaves the service.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserResponse {
    pub id: Id,
    pub name: String,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
    pub attended_events: Vec<EventSummary>,
}

/// AuthResponse
///
/// Issued on successful login. Clients send `"{tokenType} {accessToken}"` in the
/// Authorization header.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
}
