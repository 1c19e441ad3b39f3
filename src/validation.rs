//! Field-level validation of request payloads.

use std::collections::BTreeMap;
use std::fmt;

use crate::models::{
    CategoryRequest, EventRequest, LoginRequest, RegisterRequest, SpeakerRequest,
};

/// ValidationErrors
///
/// Field name (as it appears on the wire) mapped to the first message
/// recorded for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Records `message` unless the field already has one.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    fn not_blank(&mut self, field: &str, value: &str, message: &str) {
        if value.trim().is_empty() {
            self.add(field, message);
        }
    }

    fn max_len(&mut self, field: &str, value: &str, max: usize, message: &str) {
        if value.chars().count() > max {
            self.add(field, message);
        }
    }

    fn email(&mut self, field: &str, value: &str, message: &str) {
        if !value.trim().is_empty() && !looks_like_email(value) {
            self.add(field, message);
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self
            .fields
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        write!(f, "{}", joined.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// One `@`, non-empty local part and domain, no whitespace.
fn looks_like_email(value: &str) -> bool {
    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !domain.is_empty()
                && !value.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}

/// Implemented by every request payload that carries field constraints.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

impl Validate for EventRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.not_blank("name", &self.name, "Event name must not be blank.");
        if self.date.is_none() {
            errors.add("date", "Date must not be null.");
        }
        errors.not_blank("location", &self.location, "Location must not be blank.");
        if self.category_id.is_none() {
            errors.add("categoryId", "Category is required.");
        }
        errors.into_result()
    }
}

impl Validate for SpeakerRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.not_blank("name", &self.name, "Speaker name must not be blank.");
        errors.max_len("name", &self.name, 100, "Speaker name must not exceed 100 characters.");
        errors.not_blank("email", &self.email, "Speaker email must not be blank.");
        errors.email("email", &self.email, "Email format is not valid.");
        errors.max_len("email", &self.email, 100, "Speaker email must not exceed 100 characters.");
        if let Some(bio) = &self.bio {
            errors.max_len("bio", bio, 500, "Bio must not exceed 500 characters.");
        }
        errors.into_result()
    }
}

impl Validate for CategoryRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.not_blank("name", &self.name, "Category name must not be blank.");
        errors.max_len("name", &self.name, 100, "Category name must not exceed 100 characters.");
        errors.max_len(
            "description",
            &self.description,
            500,
            "Description must not exceed 500 characters.",
        );
        errors.into_result()
    }
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.not_blank("username", &self.username, "Username must not be blank.");
        let len = self.username.chars().count();
        if !(4..=20).contains(&len) {
            errors.add("username", "Username must be between 4 and 20 characters.");
        }
        errors.not_blank("password", &self.password, "Password must not be blank.");
        if self.password.chars().count() < 6 {
            errors.add("password", "Password must be at least 6 characters.");
        }
        errors.not_blank("email", &self.email, "Email must not be blank.");
        errors.email("email", &self.email, "Must be a valid email address.");
        errors.not_blank("name", &self.name, "Name must not be blank.");
        errors.into_result()
    }
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.not_blank("username", &self.username, "Username must not be blank.");
        errors.not_blank("password", &self.password, "Password must not be blank.");
        errors.into_result()
    }
}
