//! Conversions between storage entities and wire DTOs.

use crate::domain::{Attendee, Category, Event, EventDetails, NewCategory, NewSpeaker, Speaker, User};
use crate::models::{
    AttendeeResponse, CategoryRequest, CategoryResponse, EventDetailsResponse, EventResponse,
    EventSummary, SpeakerRequest, SpeakerResponse, UserResponse,
};

impl From<Category> for CategoryResponse {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            description: c.description,
        }
    }
}

impl From<Speaker> for SpeakerResponse {
    fn from(s: Speaker) -> Self {
        Self {
            id: s.id,
            name: s.name,
            email: s.email,
            bio: s.bio,
        }
    }
}

impl From<Attendee> for AttendeeResponse {
    fn from(a: Attendee) -> Self {
        Self {
            id: a.id,
            username: a.username,
            name: a.name,
        }
    }
}

impl From<Event> for EventSummary {
    fn from(e: Event) -> Self {
        Self {
            id: e.id,
            name: e.name,
            date: e.date,
            location: e.location,
        }
    }
}

/// Flat shape: the category collapses to id and name.
impl From<EventDetails> for EventResponse {
    fn from(d: EventDetails) -> Self {
        Self {
            id: d.event.id,
            name: d.event.name,
            date: d.event.date,
            location: d.event.location,
            category_id: d.category.id,
            category_name: d.category.name,
            speakers: d.speakers.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<EventDetails> for EventDetailsResponse {
    fn from(d: EventDetails) -> Self {
        Self {
            id: d.event.id,
            name: d.event.name,
            date: d.event.date,
            location: d.event.location,
            category: d.category.into(),
            speakers: d.speakers.into_iter().map(Into::into).collect(),
            attended_users: d
                .attendees
                .map(|list| list.into_iter().map(Into::into).collect()),
        }
    }
}

pub fn user_response(user: User, attended: Vec<Event>) -> UserResponse {
    let roles = user.role_names();
    UserResponse {
        id: user.id,
        name: user.name,
        username: user.username,
        email: user.email,
        roles,
        attended_events: attended.into_iter().map(Into::into).collect(),
    }
}

impl From<&CategoryRequest> for NewCategory {
    fn from(req: &CategoryRequest) -> Self {
        Self {
            name: req.name.trim().to_string(),
            description: req.description.clone(),
        }
    }
}

impl From<&SpeakerRequest> for NewSpeaker {
    fn from(req: &SpeakerRequest) -> Self {
        Self {
            name: req.name.trim().to_string(),
            email: req.email.trim().to_string(),
            bio: req.bio.clone(),
        }
    }
}
