use crate::{
    auth::AuthUser,
    domain::{EventDetails, EventDraft, Id},
    error::ApiError,
    models::{EventDetailsResponse, EventPageQuery, EventRequest, EventResponse},
    pagination::{DEFAULT_PAGE_SIZE, Page, PageRequest, Sort},
    repository::Repository,
    validation::Validate,
};

const RESOURCE: &str = "Event";

/// How the full event listing is loaded from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// One query for the events, then one per association per event.
    Naive,
    /// A single join over category and speakers. Attendees are not loaded.
    JoinFetch,
    /// A single join over category, speakers and attendees.
    EntityGraph,
}

/// StrategyListing
///
/// A full listing plus the number of storage round trips it cost.
#[derive(Debug, Clone)]
pub struct StrategyListing {
    pub strategy: FetchStrategy,
    pub round_trips: usize,
    pub events: Vec<EventDetailsResponse>,
}

/// Validates the payload and splits it into the scalar draft and the category id.
fn draft_of(req: &EventRequest) -> Result<(EventDraft, Id), ApiError> {
    req.validate()?;
    match (req.date, req.category_id) {
        (Some(date), Some(category_id)) => Ok((
            EventDraft {
                name: req.name.trim().to_string(),
                date,
                location: req.location.trim().to_string(),
            },
            category_id,
        )),
        _ => Err(ApiError::BadRequest("date and categoryId are required".into())),
    }
}

/// find_page
///
/// Paginated listing, optionally filtered by a case-insensitive substring of
/// the name. A blank filter is ignored.
pub async fn find_page(repo: &dyn Repository, query: &EventPageQuery) -> Result<Page<EventResponse>, ApiError> {
    let sort = match query.sort.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Sort::parse(raw)?,
        _ => Sort::default(),
    };
    let request = PageRequest::new(
        query.page.unwrap_or(0),
        query.size.unwrap_or(DEFAULT_PAGE_SIZE),
        sort,
    );
    // Trimming only decides whether the filter is blank; the match uses the raw value.
    let filter = query.name.as_deref().filter(|n| !n.trim().is_empty());

    tracing::debug!("Listing events (name: {:?}, request: {:?})", filter, request);
    let (content, total) = repo.page_events(filter, &request).await?;
    tracing::debug!("Found {} matching events", total);

    Ok(Page::new(content, &request, total).map(EventResponse::from))
}

pub async fn find_by_id(repo: &dyn Repository, id: Id) -> Result<EventResponse, ApiError> {
    tracing::debug!("Looking up event {}", id);
    repo.find_event(id)
        .await?
        .map(Into::into)
        .ok_or_else(|| {
            tracing::warn!("Event {} not found", id);
            ApiError::not_found(RESOURCE, id)
        })
}

/// create
///
/// Category and speakers are checked inside the insert's transaction, so a
/// missing reference answers 404 and never leaves a partial event behind.
pub async fn create(repo: &dyn Repository, req: &EventRequest) -> Result<EventResponse, ApiError> {
    let (draft, category_id) = draft_of(req)?;
    tracing::debug!("Creating event '{}'", draft.name);

    let speakers = req.speakers_ids.clone().unwrap_or_default();
    let created = repo.insert_event(&draft, category_id, &speakers).await?;
    tracing::info!("Event '{}' saved with id {}", created.event.name, created.event.id);
    Ok(created.into())
}

/// update
///
/// Replaces the scalar fields and brings the speakers to exactly the requested
/// set in one storage transaction. A missing or empty `speakersIds` clears them.
/// Precedence of 404s: event, then category, then speaker.
pub async fn update(repo: &dyn Repository, id: Id, req: &EventRequest) -> Result<EventResponse, ApiError> {
    let (draft, category_id) = draft_of(req)?;
    let target = req.speakers_ids.clone().unwrap_or_default();

    let updated = repo
        .update_event(id, &draft, category_id, &target)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Attempt to update missing event {}", id);
            ApiError::not_found(RESOURCE, id)
        })?;
    tracing::info!("Event {} updated", id);
    Ok(updated.into())
}

pub async fn delete_by_id(repo: &dyn Repository, id: Id) -> Result<(), ApiError> {
    if !repo.delete_event(id).await? {
        tracing::warn!("Attempt to delete missing event {}", id);
        return Err(ApiError::not_found(RESOURCE, id));
    }
    tracing::info!("Event {} deleted", id);
    Ok(())
}

/// Registers the caller as attending. Repeating the call is a no-op.
pub async fn attend(repo: &dyn Repository, event_id: Id, user: &AuthUser) -> Result<(), ApiError> {
    if !repo.add_attendee(event_id, user.id).await? {
        return Err(ApiError::not_found(RESOURCE, event_id));
    }
    tracing::info!("User '{}' attends event {}", user.username, event_id);
    Ok(())
}

pub async fn unattend(repo: &dyn Repository, event_id: Id, user: &AuthUser) -> Result<(), ApiError> {
    if !repo.remove_attendee(event_id, user.id).await? {
        return Err(ApiError::not_found(RESOURCE, event_id));
    }
    tracing::info!("User '{}' no longer attends event {}", user.username, event_id);
    Ok(())
}

/// list_with_strategy
///
/// Loads every event with its associations using `strategy`. The logical
/// content is the same for all strategies; only the round trips differ.
pub async fn list_with_strategy(
    repo: &dyn Repository,
    strategy: FetchStrategy,
) -> Result<StrategyListing, ApiError> {
    let (details, round_trips) = match strategy {
        FetchStrategy::Naive => load_naive(repo).await?,
        FetchStrategy::JoinFetch => (repo.list_events_with_category_and_speakers().await?, 1),
        FetchStrategy::EntityGraph => (repo.list_events_with_all_details().await?, 1),
    };

    tracing::debug!(
        "{:?} listing loaded {} events in {} round trips",
        strategy,
        details.len(),
        round_trips
    );

    Ok(StrategyListing {
        strategy,
        round_trips,
        events: details.into_iter().map(Into::into).collect(),
    })
}

/// One query for the events, then category, speakers and attendees per event.
async fn load_naive(repo: &dyn Repository) -> Result<(Vec<EventDetails>, usize), ApiError> {
    let events = repo.list_events().await?;
    let mut round_trips = 1;
    let mut details = Vec::with_capacity(events.len());

    for event in events {
        tracing::debug!("Loading associations of event {} one by one", event.id);
        let category = repo
            .find_category(event.category_id)
            .await?
            .ok_or_else(|| ApiError::Internal(format!("event {} has no category", event.id)))?;
        let speakers = repo.speakers_of_event(event.id).await?;
        let attendees = repo.attendees_of_event(event.id).await?;
        round_trips += 3;

        details.push(EventDetails {
            event,
            category,
            speakers,
            attendees: Some(attendees),
        });
    }

    Ok((details, round_trips))
}
