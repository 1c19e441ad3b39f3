use chrono::NaiveDate;
use sqlx::FromRow;
use std::collections::{BTreeMap, BTreeSet};

/// Surrogate identifier assigned by storage to every entity.
pub type Id = i64;

/// Role granting full access, including every mutation.
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
/// Role granting read access and event attendance.
pub const ROLE_USER: &str = "ROLE_USER";

// --- Entities ---

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Category {
    pub id: Id,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Speaker {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Role {
    pub id: Id,
    pub name: String,
}

/// User
///
/// A registered account. Roles are always materialized together with the user
/// because every authenticated request needs them for the access checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
}

impl User {
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }
}

/// Event
///
/// The scalar columns of an event row. Associations are loaded separately
/// (see [`EventDetails`]) according to the chosen fetch strategy.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Event {
    pub id: Id,
    pub name: String,
    pub date: NaiveDate,
    pub location: String,
    pub category_id: Id,
}

/// The mutable scalar fields of an event, as supplied by a create/update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub name: String,
    pub date: NaiveDate,
    pub location: String,
}

/// A user registered as attending an event (the inverse side of user -> events).
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Attendee {
    pub id: Id,
    pub username: String,
    pub name: String,
}

/// EventDetails
///
/// An event together with its materialized associations. `attendees` is `None`
/// when the fetch strategy did not load that association at all, which is
/// different from an event that has no attendees (`Some(vec![])`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDetails {
    pub event: Event,
    pub category: Category,
    pub speakers: Vec<Speaker>,
    pub attendees: Option<Vec<Attendee>>,
}

impl EventDetails {
    pub fn speaker_ids(&self) -> BTreeSet<Id> {
        self.speakers.iter().map(|s| s.id).collect()
    }
}

/// Inputs for creating or updating categories, speakers and users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSpeaker {
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role_ids: BTreeSet<Id>,
}

// --- Speaker set reconciliation ---

/// SpeakerDiff
///
/// The link changes needed to move an event from its current speaker set to a
/// target set. Computing the diff against the already-reconciled state yields
/// an empty diff, which makes repeated updates idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeakerDiff {
    pub removed: BTreeSet<Id>,
    pub added: BTreeSet<Id>,
}

impl SpeakerDiff {
    pub fn between(current: &BTreeSet<Id>, target: &BTreeSet<Id>) -> Self {
        Self {
            removed: current.difference(target).copied().collect(),
            added: target.difference(current).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

// --- Arena ---

/// UserRecord
///
/// Arena row for a user. Roles are kept as ids and resolved on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Id,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role_ids: BTreeSet<Id>,
}

/// EventGraph
///
/// Arena holding every entity keyed by surrogate id, plus both directions of
/// the many-to-many relations. Relations are only ever changed through the
/// `link_*`/`unlink_*` helpers, which update both sides together so the
/// forward and back references can never disagree.
#[derive(Debug, Clone, Default)]
pub struct EventGraph {
    pub categories: BTreeMap<Id, Category>,
    pub speakers: BTreeMap<Id, Speaker>,
    pub events: BTreeMap<Id, Event>,
    pub roles: BTreeMap<Id, Role>,
    pub users: BTreeMap<Id, UserRecord>,
    // event -> speakers (owning side) and speaker -> events (back-reference)
    event_speakers: BTreeMap<Id, BTreeSet<Id>>,
    speaker_events: BTreeMap<Id, BTreeSet<Id>>,
    // user -> attended events (owning side) and event -> attendees (back-reference)
    user_events: BTreeMap<Id, BTreeSet<Id>>,
    event_attendees: BTreeMap<Id, BTreeSet<Id>>,
    last_id: BTreeMap<&'static str, Id>,
}

impl EventGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next identifier for `table`, starting at 1.
    pub fn next_id(&mut self, table: &'static str) -> Id {
        let id = self.last_id.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    /// Registers `speaker_id` on the event and the event on the speaker.
    /// Returns false if the link already existed.
    pub fn link_speaker(&mut self, event_id: Id, speaker_id: Id) -> bool {
        let inserted = self.event_speakers.entry(event_id).or_default().insert(speaker_id);
        self.speaker_events.entry(speaker_id).or_default().insert(event_id);
        inserted
    }

    /// Removes the link from both sides. Returns false if it did not exist.
    pub fn unlink_speaker(&mut self, event_id: Id, speaker_id: Id) -> bool {
        let removed = self
            .event_speakers
            .get_mut(&event_id)
            .is_some_and(|set| set.remove(&speaker_id));
        if let Some(set) = self.speaker_events.get_mut(&speaker_id) {
            set.remove(&event_id);
        }
        removed
    }

    pub fn apply_speaker_diff(&mut self, event_id: Id, diff: &SpeakerDiff) {
        for speaker_id in &diff.removed {
            self.unlink_speaker(event_id, *speaker_id);
        }
        for speaker_id in &diff.added {
            self.link_speaker(event_id, *speaker_id);
        }
    }

    /// Brings the event's speaker set to exactly `target`, returning the
    /// changes that were applied.
    pub fn reconcile_speakers(&mut self, event_id: Id, target: &BTreeSet<Id>) -> SpeakerDiff {
        let diff = SpeakerDiff::between(&self.speaker_ids_of(event_id), target);
        self.apply_speaker_diff(event_id, &diff);
        diff
    }

    /// Registers the user as attending the event, on both sides.
    pub fn link_attendee(&mut self, user_id: Id, event_id: Id) -> bool {
        let inserted = self.user_events.entry(user_id).or_default().insert(event_id);
        self.event_attendees.entry(event_id).or_default().insert(user_id);
        inserted
    }

    pub fn unlink_attendee(&mut self, user_id: Id, event_id: Id) -> bool {
        let removed = self
            .user_events
            .get_mut(&user_id)
            .is_some_and(|set| set.remove(&event_id));
        if let Some(set) = self.event_attendees.get_mut(&event_id) {
            set.remove(&user_id);
        }
        removed
    }

    /// Drops every relation the event takes part in.
    pub fn detach_event(&mut self, event_id: Id) {
        for speaker_id in self.speaker_ids_of(event_id) {
            self.unlink_speaker(event_id, speaker_id);
        }
        for user_id in self.attendee_ids_of(event_id) {
            self.unlink_attendee(user_id, event_id);
        }
        self.event_speakers.remove(&event_id);
        self.event_attendees.remove(&event_id);
    }

    pub fn speaker_ids_of(&self, event_id: Id) -> BTreeSet<Id> {
        self.event_speakers.get(&event_id).cloned().unwrap_or_default()
    }

    pub fn event_ids_of_speaker(&self, speaker_id: Id) -> BTreeSet<Id> {
        self.speaker_events.get(&speaker_id).cloned().unwrap_or_default()
    }

    pub fn attendee_ids_of(&self, event_id: Id) -> BTreeSet<Id> {
        self.event_attendees.get(&event_id).cloned().unwrap_or_default()
    }

    pub fn event_ids_of_user(&self, user_id: Id) -> BTreeSet<Id> {
        self.user_events.get(&user_id).cloned().unwrap_or_default()
    }

    pub fn speakers_of(&self, event_id: Id) -> Vec<Speaker> {
        self.speaker_ids_of(event_id)
            .iter()
            .filter_map(|id| self.speakers.get(id).cloned())
            .collect()
    }

    pub fn attendees_of(&self, event_id: Id) -> Vec<Attendee> {
        self.attendee_ids_of(event_id)
            .iter()
            .filter_map(|id| self.users.get(id))
            .map(|u| Attendee {
                id: u.id,
                username: u.username.clone(),
                name: u.name.clone(),
            })
            .collect()
    }

    pub fn user(&self, user_id: Id) -> Option<User> {
        let record = self.users.get(&user_id)?;
        Some(User {
            id: record.id,
            name: record.name.clone(),
            username: record.username.clone(),
            email: record.email.clone(),
            password_hash: record.password_hash.clone(),
            roles: record
                .role_ids
                .iter()
                .filter_map(|id| self.roles.get(id).cloned())
                .collect(),
        })
    }

    /// Materializes an event with category and speakers, and attendees only
    /// when `with_attendees` is set.
    pub fn details(&self, event_id: Id, with_attendees: bool) -> Option<EventDetails> {
        let event = self.events.get(&event_id)?.clone();
        let category = self.categories.get(&event.category_id)?.clone();
        Some(EventDetails {
            speakers: self.speakers_of(event_id),
            attendees: with_attendees.then(|| self.attendees_of(event_id)),
            event,
            category,
        })
    }
}
