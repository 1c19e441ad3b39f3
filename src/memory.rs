//! In-process [`Repository`] used for local runs without a database and by
//! the test suites.
//!
//! Every write validates all of its preconditions before touching the graph,
//! so a failed operation never leaves a partial change behind.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use crate::domain::{
    Attendee, Category, Event, EventDetails, EventDraft, EventGraph, Id, NewCategory, NewSpeaker,
    NewUser, Role, Speaker, User, UserRecord,
};
use crate::pagination::{Direction, EventSortField, PageRequest};
use crate::repository::{RepoError, Repository};

#[derive(Default)]
pub struct InMemoryRepository {
    graph: Mutex<EventGraph>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, EventGraph>, RepoError> {
        self.graph
            .lock()
            .map_err(|_| RepoError::Unavailable("in-memory store lock poisoned".into()))
    }
}

/// Case-insensitive, raw bytes breaking ties. Mirrors `Sort::order_by_sql`.
fn text_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

fn compare_events(a: &Event, b: &Event, request: &PageRequest) -> Ordering {
    let ord = match request.sort.field {
        EventSortField::Id => a.id.cmp(&b.id),
        EventSortField::Name => text_order(&a.name, &b.name),
        EventSortField::Date => a.date.cmp(&b.date),
        EventSortField::Location => text_order(&a.location, &b.location),
    };
    let ord = match request.sort.direction {
        Direction::Asc => ord,
        Direction::Desc => ord.reverse(),
    };
    ord.then(a.id.cmp(&b.id))
}

/// First missing reference of an event write: the category, then the lowest speaker id.
fn check_references(graph: &EventGraph, category_id: Id, speaker_ids: &BTreeSet<Id>) -> Result<(), RepoError> {
    if !graph.categories.contains_key(&category_id) {
        return Err(RepoError::MissingReference { entity: "Category", id: category_id });
    }
    match speaker_ids.iter().find(|id| !graph.speakers.contains_key(id)) {
        Some(missing) => Err(RepoError::MissingReference { entity: "Speaker", id: *missing }),
        None => Ok(()),
    }
}

fn conflict(what: impl Into<String>) -> RepoError {
    RepoError::Conflict(what.into())
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_categories(&self) -> Result<Vec<Category>, RepoError> {
        Ok(self.lock()?.categories.values().cloned().collect())
    }

    async fn find_category(&self, id: Id) -> Result<Option<Category>, RepoError> {
        Ok(self.lock()?.categories.get(&id).cloned())
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, RepoError> {
        Ok(self.lock()?.categories.values().find(|c| c.name == name).cloned())
    }

    async fn insert_category(&self, category: &NewCategory) -> Result<Category, RepoError> {
        let mut graph = self.lock()?;
        if graph.categories.values().any(|c| c.name == category.name) {
            return Err(conflict("categories_name_key"));
        }
        let id = graph.next_id("categories");
        let created = Category {
            id,
            name: category.name.clone(),
            description: category.description.clone(),
        };
        graph.categories.insert(id, created.clone());
        Ok(created)
    }

    async fn update_category(&self, id: Id, category: &NewCategory) -> Result<Option<Category>, RepoError> {
        let mut graph = self.lock()?;
        if !graph.categories.contains_key(&id) {
            return Ok(None);
        }
        if graph.categories.values().any(|c| c.id != id && c.name == category.name) {
            return Err(conflict("categories_name_key"));
        }
        let updated = Category {
            id,
            name: category.name.clone(),
            description: category.description.clone(),
        };
        graph.categories.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_category(&self, id: Id) -> Result<bool, RepoError> {
        let mut graph = self.lock()?;
        if !graph.categories.contains_key(&id) {
            return Ok(false);
        }
        if graph.events.values().any(|e| e.category_id == id) {
            return Err(conflict("events_category_id_fkey"));
        }
        graph.categories.remove(&id);
        Ok(true)
    }

    async fn list_speakers(&self) -> Result<Vec<Speaker>, RepoError> {
        Ok(self.lock()?.speakers.values().cloned().collect())
    }

    async fn find_speaker(&self, id: Id) -> Result<Option<Speaker>, RepoError> {
        Ok(self.lock()?.speakers.get(&id).cloned())
    }

    async fn find_speaker_by_email(&self, email: &str) -> Result<Option<Speaker>, RepoError> {
        Ok(self.lock()?.speakers.values().find(|s| s.email == email).cloned())
    }

    async fn insert_speaker(&self, speaker: &NewSpeaker) -> Result<Speaker, RepoError> {
        let mut graph = self.lock()?;
        if graph.speakers.values().any(|s| s.email == speaker.email) {
            return Err(conflict("speakers_email_key"));
        }
        let id = graph.next_id("speakers");
        let created = Speaker {
            id,
            name: speaker.name.clone(),
            email: speaker.email.clone(),
            bio: speaker.bio.clone(),
        };
        graph.speakers.insert(id, created.clone());
        Ok(created)
    }

    async fn update_speaker(&self, id: Id, speaker: &NewSpeaker) -> Result<Option<Speaker>, RepoError> {
        let mut graph = self.lock()?;
        if !graph.speakers.contains_key(&id) {
            return Ok(None);
        }
        if graph.speakers.values().any(|s| s.id != id && s.email == speaker.email) {
            return Err(conflict("speakers_email_key"));
        }
        let updated = Speaker {
            id,
            name: speaker.name.clone(),
            email: speaker.email.clone(),
            bio: speaker.bio.clone(),
        };
        graph.speakers.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_speaker(&self, id: Id) -> Result<bool, RepoError> {
        let mut graph = self.lock()?;
        if !graph.speakers.contains_key(&id) {
            return Ok(false);
        }
        if !graph.event_ids_of_speaker(id).is_empty() {
            return Err(conflict("event_speakers_speaker_id_fkey"));
        }
        graph.speakers.remove(&id);
        Ok(true)
    }

    async fn list_events(&self) -> Result<Vec<Event>, RepoError> {
        Ok(self.lock()?.events.values().cloned().collect())
    }

    async fn count_events(&self) -> Result<i64, RepoError> {
        Ok(self.lock()?.events.len() as i64)
    }

    async fn speakers_of_event(&self, event_id: Id) -> Result<Vec<Speaker>, RepoError> {
        Ok(self.lock()?.speakers_of(event_id))
    }

    async fn attendees_of_event(&self, event_id: Id) -> Result<Vec<Attendee>, RepoError> {
        Ok(self.lock()?.attendees_of(event_id))
    }

    async fn list_events_with_category_and_speakers(&self) -> Result<Vec<EventDetails>, RepoError> {
        let graph = self.lock()?;
        Ok(graph.events.keys().filter_map(|id| graph.details(*id, false)).collect())
    }

    async fn list_events_with_all_details(&self) -> Result<Vec<EventDetails>, RepoError> {
        let graph = self.lock()?;
        Ok(graph.events.keys().filter_map(|id| graph.details(*id, true)).collect())
    }

    async fn page_events(
        &self,
        name_filter: Option<&str>,
        request: &PageRequest,
    ) -> Result<(Vec<EventDetails>, i64), RepoError> {
        let graph = self.lock()?;
        let needle = name_filter.map(str::to_lowercase);

        let mut matches: Vec<&Event> = graph
            .events
            .values()
            .filter(|e| match &needle {
                Some(n) => e.name.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .collect();
        matches.sort_by(|a, b| compare_events(a, b, request));

        let total = matches.len() as i64;
        let content = matches
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.limit() as usize)
            .filter_map(|e| graph.details(e.id, false))
            .collect();
        Ok((content, total))
    }

    async fn find_event(&self, id: Id) -> Result<Option<EventDetails>, RepoError> {
        Ok(self.lock()?.details(id, false))
    }

    async fn insert_event(
        &self,
        draft: &EventDraft,
        category_id: Id,
        speaker_ids: &BTreeSet<Id>,
    ) -> Result<EventDetails, RepoError> {
        let mut graph = self.lock()?;
        check_references(&graph, category_id, speaker_ids)?;

        let id = graph.next_id("events");
        graph.events.insert(
            id,
            Event {
                id,
                name: draft.name.clone(),
                date: draft.date,
                location: draft.location.clone(),
                category_id,
            },
        );
        for speaker_id in speaker_ids {
            graph.link_speaker(id, *speaker_id);
        }
        graph
            .details(id, false)
            .ok_or_else(|| RepoError::Unavailable(format!("event {id} vanished after insert")))
    }

    async fn update_event(
        &self,
        id: Id,
        draft: &EventDraft,
        category_id: Id,
        speaker_ids: &BTreeSet<Id>,
    ) -> Result<Option<EventDetails>, RepoError> {
        let mut graph = self.lock()?;
        if !graph.events.contains_key(&id) {
            return Ok(None);
        }
        check_references(&graph, category_id, speaker_ids)?;

        graph.events.insert(
            id,
            Event {
                id,
                name: draft.name.clone(),
                date: draft.date,
                location: draft.location.clone(),
                category_id,
            },
        );
        let diff = graph.reconcile_speakers(id, speaker_ids);
        tracing::debug!("Event {} speakers: removing {:?}, adding {:?}", id, diff.removed, diff.added);
        Ok(graph.details(id, false))
    }

    async fn delete_event(&self, id: Id) -> Result<bool, RepoError> {
        let mut graph = self.lock()?;
        if graph.events.remove(&id).is_none() {
            return Ok(false);
        }
        graph.detach_event(id);
        Ok(true)
    }

    async fn add_attendee(&self, event_id: Id, user_id: Id) -> Result<bool, RepoError> {
        let mut graph = self.lock()?;
        if !graph.events.contains_key(&event_id) {
            return Ok(false);
        }
        if !graph.users.contains_key(&user_id) {
            return Err(conflict("user_attended_events_user_id_fkey"));
        }
        graph.link_attendee(user_id, event_id);
        Ok(true)
    }

    async fn remove_attendee(&self, event_id: Id, user_id: Id) -> Result<bool, RepoError> {
        let mut graph = self.lock()?;
        if !graph.events.contains_key(&event_id) {
            return Ok(false);
        }
        graph.unlink_attendee(user_id, event_id);
        Ok(true)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let graph = self.lock()?;
        let id = graph.users.values().find(|u| u.username == username).map(|u| u.id);
        Ok(id.and_then(|id| graph.user(id)))
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepoError> {
        Ok(self.lock()?.users.values().any(|u| u.username == username))
    }

    async fn email_exists(&self, email: &str) -> Result<bool, RepoError> {
        Ok(self.lock()?.users.values().any(|u| u.email == email))
    }

    async fn insert_user(&self, user: &NewUser) -> Result<User, RepoError> {
        let mut graph = self.lock()?;
        if graph.users.values().any(|u| u.username == user.username) {
            return Err(conflict("users_username_key"));
        }
        if graph.users.values().any(|u| u.email == user.email) {
            return Err(conflict("users_email_key"));
        }
        if user.role_ids.iter().any(|id| !graph.roles.contains_key(id)) {
            return Err(conflict("users_roles_role_id_fkey"));
        }

        let id = graph.next_id("users");
        graph.users.insert(
            id,
            UserRecord {
                id,
                name: user.name.clone(),
                username: user.username.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                role_ids: user.role_ids.clone(),
            },
        );
        graph
            .user(id)
            .ok_or_else(|| RepoError::Unavailable(format!("user {id} vanished after insert")))
    }

    async fn attended_events(&self, user_id: Id) -> Result<Vec<Event>, RepoError> {
        let graph = self.lock()?;
        Ok(graph
            .event_ids_of_user(user_id)
            .iter()
            .filter_map(|id| graph.events.get(id).cloned())
            .collect())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, RepoError> {
        Ok(self.lock()?.roles.values().find(|r| r.name == name).cloned())
    }

    async fn insert_role(&self, name: &str) -> Result<Role, RepoError> {
        let mut graph = self.lock()?;
        if graph.roles.values().any(|r| r.name == name) {
            return Err(conflict("roles_name_key"));
        }
        let id = graph.next_id("roles");
        let role = Role { id, name: name.to_string() };
        graph.roles.insert(id, role.clone());
        Ok(role)
    }
}
