//! API error taxonomy and its JSON rendering.
//!
//! Every failure a handler can produce ends up here and is rendered as
//! `{ status, error, message, errors? }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::repository::RepoError;
use crate::validation::ValidationErrors;

const CONFLICT_MESSAGE: &str = "The operation could not be completed because of a data conflict. \
Make sure values are unique and referenced resources exist.";
const INTERNAL_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Field-level validation failed (400)
    Validation(ValidationErrors),

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Request rejected for a reason other than field validation (400)
    BadRequest(String),

    /// Missing or invalid credentials (401)
    Unauthorized,

    /// Authenticated but lacking the required role (403)
    Forbidden,

    /// Storage-level uniqueness or referential conflict (409)
    Conflict(String),

    /// Anything else (500, logged)
    Internal(String),
}

impl ApiError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "validation failed: {e}"),
            Self::NotFound { resource, id } => write!(f, "{resource} not found with id: {id}"),
            Self::BadRequest(msg) => write!(f, "bad request: {msg}"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// ErrorBody
///
/// Wire shape of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub status: u16,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub errors: Option<BTreeMap<String, String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, message, errors) = match self {
            Self::Validation(e) => (
                "Bad Request",
                "Validation failed".to_string(),
                Some(e.fields().clone()),
            ),
            Self::NotFound { resource, id } => (
                "Not Found",
                format!("{resource} not found with id: {id}"),
                None,
            ),
            Self::BadRequest(message) => ("Bad Request", message, None),
            Self::Unauthorized => (
                "Unauthorized",
                "Full authentication is required to access this resource".to_string(),
                None,
            ),
            Self::Forbidden => ("Forbidden", "Access denied".to_string(), None),
            Self::Conflict(detail) => {
                // Constraint names stay in the logs only.
                tracing::warn!("Data conflict: {}", detail);
                ("Data Conflict", CONFLICT_MESSAGE.to_string(), None)
            }
            Self::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                ("Internal Server Error", INTERNAL_MESSAGE.to_string(), None)
            }
        };

        let body = ErrorBody {
            status: status.as_u16(),
            error: error.to_string(),
            message,
            errors,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        Self::Validation(e)
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict(detail) => Self::Conflict(detail),
            RepoError::MissingReference { entity, id } => {
                tracing::warn!("{} {} not found while writing", entity, id);
                Self::not_found(entity, id)
            }
            other => Self::Internal(other.to_string()),
        }
    }
}
