use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction, query_builder::QueryBuilder};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{
    Attendee, Category, Event, EventDetails, EventDraft, Id, NewCategory, NewSpeaker, NewUser,
    Role, Speaker, SpeakerDiff, User,
};
use crate::pagination::PageRequest;

/// RepoError
///
/// Storage failures. Uniqueness and foreign-key violations are classified as
/// `Conflict` so the API layer can answer 409 without inspecting driver errors.
/// References checked inside a write transaction surface as `MissingReference`.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("constraint violated: {0}")]
    Conflict(String),

    /// A write referenced a row that does not exist.
    #[error("{entity} {id} does not exist")]
    MissingReference { entity: &'static str, id: Id },

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() || db.is_foreign_key_violation() {
                let detail = db
                    .constraint()
                    .map(str::to_string)
                    .unwrap_or_else(|| db.message().to_string());
                return Self::Conflict(detail);
            }
        }
        Self::Database(e)
    }
}

/// Repository Trait
///
/// Abstract contract for every persistence operation. Handlers and services
/// only ever see `Arc<dyn Repository>`, so the Postgres store and the
/// in-memory store are interchangeable.
///
/// Multi-step writes are atomic: an error leaves storage unchanged.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Categories ---
    async fn list_categories(&self) -> Result<Vec<Category>, RepoError>;
    async fn find_category(&self, id: Id) -> Result<Option<Category>, RepoError>;
    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, RepoError>;
    async fn insert_category(&self, category: &NewCategory) -> Result<Category, RepoError>;
    async fn update_category(&self, id: Id, category: &NewCategory) -> Result<Option<Category>, RepoError>;
    // Conflict while any event still references the category.
    async fn delete_category(&self, id: Id) -> Result<bool, RepoError>;

    // --- Speakers ---
    async fn list_speakers(&self) -> Result<Vec<Speaker>, RepoError>;
    async fn find_speaker(&self, id: Id) -> Result<Option<Speaker>, RepoError>;
    async fn find_speaker_by_email(&self, email: &str) -> Result<Option<Speaker>, RepoError>;
    async fn insert_speaker(&self, speaker: &NewSpeaker) -> Result<Speaker, RepoError>;
    async fn update_speaker(&self, id: Id, speaker: &NewSpeaker) -> Result<Option<Speaker>, RepoError>;
    // Conflict while the speaker is linked to any event.
    async fn delete_speaker(&self, id: Id) -> Result<bool, RepoError>;

    // --- Events: single-association loads (used by the naive strategy) ---
    async fn list_events(&self) -> Result<Vec<Event>, RepoError>;
    async fn count_events(&self) -> Result<i64, RepoError>;
    async fn speakers_of_event(&self, event_id: Id) -> Result<Vec<Speaker>, RepoError>;
    async fn attendees_of_event(&self, event_id: Id) -> Result<Vec<Attendee>, RepoError>;

    // --- Events: graph loads in a single round trip ---
    /// Events with category and speakers; `attendees` stays `None`.
    async fn list_events_with_category_and_speakers(&self) -> Result<Vec<EventDetails>, RepoError>;
    /// Events with category, speakers and attendees.
    async fn list_events_with_all_details(&self) -> Result<Vec<EventDetails>, RepoError>;
    /// One page of events (category and speakers loaded) plus the total match count.
    async fn page_events(
        &self,
        name_filter: Option<&str>,
        request: &PageRequest,
    ) -> Result<(Vec<EventDetails>, i64), RepoError>;
    async fn find_event(&self, id: Id) -> Result<Option<EventDetails>, RepoError>;

    // --- Events: writes ---
    /// Fails with `MissingReference` for an unknown category, then for the
    /// lowest unknown speaker id. Nothing is written in that case.
    async fn insert_event(
        &self,
        draft: &EventDraft,
        category_id: Id,
        speaker_ids: &BTreeSet<Id>,
    ) -> Result<EventDetails, RepoError>;
    /// Replaces the scalar fields and brings the speaker set to exactly
    /// `speaker_ids`, diffing against the links read in the same transaction.
    /// `None` when the event does not exist; references are checked as on insert.
    async fn update_event(
        &self,
        id: Id,
        draft: &EventDraft,
        category_id: Id,
        speaker_ids: &BTreeSet<Id>,
    ) -> Result<Option<EventDetails>, RepoError>;
    /// Removes the event together with its speaker and attendance links.
    async fn delete_event(&self, id: Id) -> Result<bool, RepoError>;
    /// Idempotent. Returns false only when the event does not exist.
    async fn add_attendee(&self, event_id: Id, user_id: Id) -> Result<bool, RepoError>;
    async fn remove_attendee(&self, event_id: Id, user_id: Id) -> Result<bool, RepoError>;

    // --- Users and roles ---
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;
    async fn username_exists(&self, username: &str) -> Result<bool, RepoError>;
    async fn email_exists(&self, email: &str) -> Result<bool, RepoError>;
    async fn insert_user(&self, user: &NewUser) -> Result<User, RepoError>;
    async fn attended_events(&self, user_id: Id) -> Result<Vec<Event>, RepoError>;
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, RepoError>;
    async fn insert_role(&self, name: &str) -> Result<Role, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

const EVENT_COLUMNS: &str = "id, name, date, location, category_id";

/// Events joined with their category and speakers. One row per (event, speaker).
const EVENT_GRAPH_SELECT: &str = r#"
    SELECT
        e.id, e.name, e.date, e.location, e.category_id,
        c.name AS category_name, c.description AS category_description,
        s.id AS speaker_id, s.name AS speaker_name, s.email AS speaker_email, s.bio AS speaker_bio
    FROM events e
    JOIN categories c ON c.id = e.category_id
    LEFT JOIN event_speakers es ON es.event_id = e.id
    LEFT JOIN speakers s ON s.id = es.speaker_id
"#;

/// Same graph plus attendees. One row per (event, speaker, attendee).
const EVENT_FULL_GRAPH_SELECT: &str = r#"
    SELECT
        e.id, e.name, e.date, e.location, e.category_id,
        c.name AS category_name, c.description AS category_description,
        s.id AS speaker_id, s.name AS speaker_name, s.email AS speaker_email, s.bio AS speaker_bio,
        u.id AS attendee_id, u.username AS attendee_username, u.name AS attendee_name
    FROM events e
    JOIN categories c ON c.id = e.category_id
    LEFT JOIN event_speakers es ON es.event_id = e.id
    LEFT JOIN speakers s ON s.id = es.speaker_id
    LEFT JOIN user_attended_events ua ON ua.event_id = e.id
    LEFT JOIN users u ON u.id = ua.user_id
"#;

#[derive(FromRow)]
struct EventGraphRow {
    id: Id,
    name: String,
    date: NaiveDate,
    location: String,
    category_id: Id,
    category_name: String,
    category_description: String,
    speaker_id: Option<Id>,
    speaker_name: Option<String>,
    speaker_email: Option<String>,
    speaker_bio: Option<String>,
    #[sqlx(default)]
    attendee_id: Option<Id>,
    #[sqlx(default)]
    attendee_username: Option<String>,
    #[sqlx(default)]
    attendee_name: Option<String>,
}

#[derive(FromRow)]
struct UserRow {
    id: Id,
    name: String,
    username: String,
    email: String,
    password_hash: String,
}

struct GraphAccumulator {
    event: Event,
    category: Category,
    speakers: BTreeMap<Id, Speaker>,
    attendees: BTreeMap<Id, Attendee>,
}

/// Collapses the cartesian join rows back into one `EventDetails` per event,
/// keeping the order in which events first appear.
fn fold_event_rows(rows: Vec<EventGraphRow>, with_attendees: bool) -> Vec<EventDetails> {
    let mut order: Vec<Id> = Vec::new();
    let mut acc: HashMap<Id, GraphAccumulator> = HashMap::new();

    for row in rows {
        let entry = acc.entry(row.id).or_insert_with(|| {
            order.push(row.id);
            GraphAccumulator {
                event: Event {
                    id: row.id,
                    name: row.name.clone(),
                    date: row.date,
                    location: row.location.clone(),
                    category_id: row.category_id,
                },
                category: Category {
                    id: row.category_id,
                    name: row.category_name.clone(),
                    description: row.category_description.clone(),
                },
                speakers: BTreeMap::new(),
                attendees: BTreeMap::new(),
            }
        });

        if let (Some(id), Some(name), Some(email)) = (row.speaker_id, row.speaker_name, row.speaker_email) {
            entry.speakers.entry(id).or_insert(Speaker {
                id,
                name,
                email,
                bio: row.speaker_bio,
            });
        }
        if let (Some(id), Some(username), Some(name)) = (row.attendee_id, row.attendee_username, row.attendee_name) {
            entry.attendees.entry(id).or_insert(Attendee { id, username, name });
        }
    }

    order
        .into_iter()
        .filter_map(|id| acc.remove(&id))
        .map(|a| EventDetails {
            event: a.event,
            category: a.category,
            speakers: a.speakers.into_values().collect(),
            attendees: with_attendees.then(|| a.attendees.into_values().collect()),
        })
        .collect()
}

/// Escapes LIKE metacharacters and wraps the term for a substring match.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn push_name_filter(builder: &mut QueryBuilder<'_, Postgres>, pattern: Option<&str>) {
    if let Some(p) = pattern {
        builder.push(" WHERE name ILIKE ");
        builder.push_bind(p.to_string());
        builder.push(" ESCAPE '\\'");
    }
}

async fn load_event(conn: &mut PgConnection, id: Id) -> Result<Option<EventDetails>, RepoError> {
    let sql = format!("{EVENT_GRAPH_SELECT} WHERE e.id = $1 ORDER BY s.id");
    let rows = sqlx::query_as::<_, EventGraphRow>(&sql)
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(fold_event_rows(rows, false).into_iter().next())
}

async fn link_speakers(conn: &mut PgConnection, event_id: Id, speaker_ids: &BTreeSet<Id>) -> Result<(), RepoError> {
    if speaker_ids.is_empty() {
        return Ok(());
    }
    let ids: Vec<Id> = speaker_ids.iter().copied().collect();
    sqlx::query(
        "INSERT INTO event_speakers (event_id, speaker_id) \
         SELECT $1, UNNEST($2::bigint[]) ON CONFLICT DO NOTHING",
    )
    .bind(event_id)
    .bind(ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Locks the referenced category and speakers against concurrent deletion,
/// reporting the first one that does not exist.
async fn lock_references(
    conn: &mut PgConnection,
    category_id: Id,
    speaker_ids: &BTreeSet<Id>,
) -> Result<(), RepoError> {
    let category: Option<Id> = sqlx::query_scalar("SELECT id FROM categories WHERE id = $1 FOR KEY SHARE")
        .bind(category_id)
        .fetch_optional(&mut *conn)
        .await?;
    if category.is_none() {
        return Err(RepoError::MissingReference { entity: "Category", id: category_id });
    }

    if speaker_ids.is_empty() {
        return Ok(());
    }
    let ids: Vec<Id> = speaker_ids.iter().copied().collect();
    let found: BTreeSet<Id> = sqlx::query_scalar::<_, Id>("SELECT id FROM speakers WHERE id = ANY($1) FOR KEY SHARE")
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .collect();
    match speaker_ids.difference(&found).next() {
        Some(missing) => Err(RepoError::MissingReference { entity: "Speaker", id: *missing }),
        None => Ok(()),
    }
}

async fn roles_of(conn: &mut PgConnection, user_id: Id) -> Result<Vec<Role>, RepoError> {
    let roles = sqlx::query_as::<_, Role>(
        "SELECT r.id, r.name FROM roles r \
         JOIN users_roles ur ON ur.role_id = r.id \
         WHERE ur.user_id = $1 ORDER BY r.id",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(roles)
}

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Multi-statement reads
/// run in a read-only transaction; writes run in a regular transaction that
/// is rolled back on drop if any step fails.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations in `./migrations`.
    pub async fn migrate(&self) -> Result<(), RepoError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn read_tx(&self) -> Result<Transaction<'static, Postgres>, RepoError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *tx).await?;
        Ok(tx)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_categories(&self) -> Result<Vec<Category>, RepoError> {
        let rows = sqlx::query_as::<_, Category>("SELECT id, name, description FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_category(&self, id: Id) -> Result<Option<Category>, RepoError> {
        let row = sqlx::query_as::<_, Category>("SELECT id, name, description FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, RepoError> {
        let row = sqlx::query_as::<_, Category>("SELECT id, name, description FROM categories WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_category(&self, category: &NewCategory) -> Result<Category, RepoError> {
        let row = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING id, name, description",
        )
        .bind(&category.name)
        .bind(&category.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_category(&self, id: Id, category: &NewCategory) -> Result<Option<Category>, RepoError> {
        let row = sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2, description = $3 WHERE id = $1 RETURNING id, name, description",
        )
        .bind(id)
        .bind(&category.name)
        .bind(&category.description)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_category(&self, id: Id) -> Result<bool, RepoError> {
        // events.category_id has no cascade, so a referenced category fails with a FK violation.
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_speakers(&self) -> Result<Vec<Speaker>, RepoError> {
        let rows = sqlx::query_as::<_, Speaker>("SELECT id, name, email, bio FROM speakers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_speaker(&self, id: Id) -> Result<Option<Speaker>, RepoError> {
        let row = sqlx::query_as::<_, Speaker>("SELECT id, name, email, bio FROM speakers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_speaker_by_email(&self, email: &str) -> Result<Option<Speaker>, RepoError> {
        let row = sqlx::query_as::<_, Speaker>("SELECT id, name, email, bio FROM speakers WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_speaker(&self, speaker: &NewSpeaker) -> Result<Speaker, RepoError> {
        let row = sqlx::query_as::<_, Speaker>(
            "INSERT INTO speakers (name, email, bio) VALUES ($1, $2, $3) RETURNING id, name, email, bio",
        )
        .bind(&speaker.name)
        .bind(&speaker.email)
        .bind(&speaker.bio)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_speaker(&self, id: Id, speaker: &NewSpeaker) -> Result<Option<Speaker>, RepoError> {
        let row = sqlx::query_as::<_, Speaker>(
            "UPDATE speakers SET name = $2, email = $3, bio = $4 WHERE id = $1 \
             RETURNING id, name, email, bio",
        )
        .bind(id)
        .bind(&speaker.name)
        .bind(&speaker.email)
        .bind(&speaker.bio)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_speaker(&self, id: Id) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM speakers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_events(&self) -> Result<Vec<Event>, RepoError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY id");
        let rows = sqlx::query_as::<_, Event>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn count_events(&self) -> Result<i64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn speakers_of_event(&self, event_id: Id) -> Result<Vec<Speaker>, RepoError> {
        let rows = sqlx::query_as::<_, Speaker>(
            "SELECT s.id, s.name, s.email, s.bio FROM speakers s \
             JOIN event_speakers es ON es.speaker_id = s.id \
             WHERE es.event_id = $1 ORDER BY s.id",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn attendees_of_event(&self, event_id: Id) -> Result<Vec<Attendee>, RepoError> {
        let rows = sqlx::query_as::<_, Attendee>(
            "SELECT u.id, u.username, u.name FROM users u \
             JOIN user_attended_events ua ON ua.user_id = u.id \
             WHERE ua.event_id = $1 ORDER BY u.id",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_events_with_category_and_speakers(&self) -> Result<Vec<EventDetails>, RepoError> {
        let sql = format!("{EVENT_GRAPH_SELECT} ORDER BY e.id, s.id");
        let rows = sqlx::query_as::<_, EventGraphRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(fold_event_rows(rows, false))
    }

    async fn list_events_with_all_details(&self) -> Result<Vec<EventDetails>, RepoError> {
        let sql = format!("{EVENT_FULL_GRAPH_SELECT} ORDER BY e.id, s.id, u.id");
        let rows = sqlx::query_as::<_, EventGraphRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(fold_event_rows(rows, true))
    }

    /// page_events
    ///
    /// Counts, selects the page of ids with a whitelisted ORDER BY, then loads
    /// the graph for exactly those ids. All three statements share one
    /// read-only transaction so the count and the page agree.
    async fn page_events(
        &self,
        name_filter: Option<&str>,
        request: &PageRequest,
    ) -> Result<(Vec<EventDetails>, i64), RepoError> {
        let pattern = name_filter.map(like_pattern);
        let mut tx = self.read_tx().await?;

        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM events");
        push_name_filter(&mut count, pattern.as_deref());
        let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await?;

        let mut page: QueryBuilder<Postgres> = QueryBuilder::new("SELECT id FROM events");
        push_name_filter(&mut page, pattern.as_deref());
        page.push(" ORDER BY ");
        page.push(request.sort.order_by_sql());
        page.push(" LIMIT ");
        page.push_bind(request.limit() as i64);
        page.push(" OFFSET ");
        page.push_bind(request.offset() as i64);
        let ids: Vec<Id> = page.build_query_scalar().fetch_all(&mut *tx).await?;

        if ids.is_empty() {
            tx.commit().await?;
            return Ok((Vec::new(), total));
        }

        let sql = format!("{EVENT_GRAPH_SELECT} WHERE e.id = ANY($1) ORDER BY e.id, s.id");
        let rows = sqlx::query_as::<_, EventGraphRow>(&sql)
            .bind(ids.clone())
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let mut by_id: HashMap<Id, EventDetails> = fold_event_rows(rows, false)
            .into_iter()
            .map(|d| (d.event.id, d))
            .collect();
        let content = ids.iter().filter_map(|id| by_id.remove(id)).collect();
        Ok((content, total))
    }

    async fn find_event(&self, id: Id) -> Result<Option<EventDetails>, RepoError> {
        let mut conn = self.pool.acquire().await?;
        load_event(&mut conn, id).await
    }

    async fn insert_event(
        &self,
        draft: &EventDraft,
        category_id: Id,
        speaker_ids: &BTreeSet<Id>,
    ) -> Result<EventDetails, RepoError> {
        let mut tx = self.pool.begin().await?;
        lock_references(&mut tx, category_id, speaker_ids).await?;

        let id: Id = sqlx::query_scalar(
            "INSERT INTO events (name, date, location, category_id) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&draft.name)
        .bind(draft.date)
        .bind(&draft.location)
        .bind(category_id)
        .fetch_one(&mut *tx)
        .await?;

        link_speakers(&mut tx, id, speaker_ids).await?;
        let details = load_event(&mut tx, id)
            .await?
            .ok_or_else(|| RepoError::Unavailable(format!("event {id} vanished after insert")))?;

        tx.commit().await?;
        Ok(details)
    }

    async fn update_event(
        &self,
        id: Id,
        draft: &EventDraft,
        category_id: Id,
        speaker_ids: &BTreeSet<Id>,
    ) -> Result<Option<EventDetails>, RepoError> {
        let mut tx = self.pool.begin().await?;

        // Row lock: concurrent updates of the same event serialize here, so the
        // link set read below is the one the diff is applied to.
        let locked: Option<Id> = sqlx::query_scalar("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }
        lock_references(&mut tx, category_id, speaker_ids).await?;

        sqlx::query("UPDATE events SET name = $2, date = $3, location = $4, category_id = $5 WHERE id = $1")
            .bind(id)
            .bind(&draft.name)
            .bind(draft.date)
            .bind(&draft.location)
            .bind(category_id)
            .execute(&mut *tx)
            .await?;

        let current: BTreeSet<Id> =
            sqlx::query_scalar::<_, Id>("SELECT speaker_id FROM event_speakers WHERE event_id = $1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .collect();
        let diff = SpeakerDiff::between(&current, speaker_ids);
        tracing::debug!("Event {} speakers: removing {:?}, adding {:?}", id, diff.removed, diff.added);

        if !diff.removed.is_empty() {
            let removed: Vec<Id> = diff.removed.iter().copied().collect();
            sqlx::query("DELETE FROM event_speakers WHERE event_id = $1 AND speaker_id = ANY($2)")
                .bind(id)
                .bind(removed)
                .execute(&mut *tx)
                .await?;
        }
        link_speakers(&mut tx, id, &diff.added).await?;

        let details = load_event(&mut tx, id).await?;
        tx.commit().await?;
        Ok(details)
    }

    async fn delete_event(&self, id: Id) -> Result<bool, RepoError> {
        // event_speakers and user_attended_events cascade on the event side.
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_attendee(&self, event_id: Id, user_id: Id) -> Result<bool, RepoError> {
        let mut tx = self.pool.begin().await?;
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM events WHERE id = $1)")
            .bind(event_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            tx.rollback().await?;
            return Ok(false);
        }
        sqlx::query(
            "INSERT INTO user_attended_events (user_id, event_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(event_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn remove_attendee(&self, event_id: Id, user_id: Id) -> Result<bool, RepoError> {
        let mut tx = self.pool.begin().await?;
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM events WHERE id = $1)")
            .bind(event_id)
            .fetch_one(&mut *tx)
            .await?;
        if exists {
            sqlx::query("DELETE FROM user_attended_events WHERE user_id = $1 AND event_id = $2")
                .bind(user_id)
                .bind(event_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(exists)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let mut tx = self.read_tx().await?;
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, username, email, password AS password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&mut *tx)
        .await?;

        let user = match row {
            Some(row) => {
                let roles = roles_of(&mut tx, row.id).await?;
                Some(User {
                    id: row.id,
                    name: row.name,
                    username: row.username,
                    email: row.email,
                    password_hash: row.password_hash,
                    roles,
                })
            }
            None => None,
        };
        tx.commit().await?;
        Ok(user)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepoError> {
        let exists = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, RepoError> {
        let exists = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn insert_user(&self, user: &NewUser) -> Result<User, RepoError> {
        let mut tx = self.pool.begin().await?;

        let id: Id = sqlx::query_scalar(
            "INSERT INTO users (name, username, email, password) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&mut *tx)
        .await?;

        if !user.role_ids.is_empty() {
            let role_ids: Vec<Id> = user.role_ids.iter().copied().collect();
            sqlx::query("INSERT INTO users_roles (user_id, role_id) SELECT $1, UNNEST($2::bigint[])")
                .bind(id)
                .bind(role_ids)
                .execute(&mut *tx)
                .await?;
        }

        let roles = roles_of(&mut tx, id).await?;
        tx.commit().await?;

        Ok(User {
            id,
            name: user.name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            roles,
        })
    }

    async fn attended_events(&self, user_id: Id) -> Result<Vec<Event>, RepoError> {
        let rows = sqlx::query_as::<_, Event>(
            "SELECT e.id, e.name, e.date, e.location, e.category_id FROM events e \
             JOIN user_attended_events ua ON ua.event_id = e.id \
             WHERE ua.user_id = $1 ORDER BY e.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, RepoError> {
        let row = sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_role(&self, name: &str) -> Result<Role, RepoError> {
        let row = sqlx::query_as::<_, Role>("INSERT INTO roles (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }
}
