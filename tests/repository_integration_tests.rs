//! Postgres-backed repository tests. They need a reachable database:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

use chrono::{NaiveDate, Utc};
use events_api::{
    domain::{EventDraft, NewCategory, NewSpeaker, NewUser},
    pagination::{PageRequest, Sort},
    repository::{PostgresRepository, RepoError, Repository},
};
use sqlx::PgPool;
use std::collections::BTreeSet;

// --- Test Context and Setup ---

struct DbTestContext {
    repo: PostgresRepository,
    // Appended to unique columns so tests can share one database.
    tag: String,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        let repo = PostgresRepository::new(pool);
        repo.migrate().await.expect("Failed to run database migrations.");

        let tag = Utc::now().timestamp_nanos_opt().unwrap_or_default().to_string();
        DbTestContext { repo, tag }
    }

    fn unique(&self, base: &str) -> String {
        format!("{base}-{}", self.tag)
    }

    async fn category(&self, base: &str) -> events_api::domain::Category {
        self.repo
            .insert_category(&NewCategory {
                name: self.unique(base),
                description: "test".into(),
            })
            .await
            .expect("Failed to insert category")
    }

    async fn speaker(&self, base: &str) -> events_api::domain::Speaker {
        self.repo
            .insert_speaker(&NewSpeaker {
                name: base.into(),
                email: format!("{}@test.com", self.unique(base)),
                bio: None,
            })
            .await
            .expect("Failed to insert speaker")
    }
}

fn draft(name: &str) -> EventDraft {
    EventDraft {
        name: name.into(),
        date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        location: "Sala 3".into(),
    }
}

// --- Tests ---

#[tokio::test]
#[ignore]
async fn test_event_graph_round_trip() {
    let ctx = DbTestContext::setup().await;
    let category = ctx.category("Taller").await;
    let john = ctx.speaker("john").await;
    let jane = ctx.speaker("jane").await;

    let created = ctx
        .repo
        .insert_event(&draft(&ctx.unique("Evento")), category.id, &BTreeSet::from([john.id, jane.id]))
        .await
        .unwrap();
    assert_eq!(created.category.id, category.id);
    assert_eq!(created.speaker_ids(), BTreeSet::from([john.id, jane.id]));

    // An unknown speaker aborts the whole update.
    let err = ctx
        .repo
        .update_event(created.event.id, &draft("Renombrado"), category.id, &BTreeSet::from([jane.id, i64::MAX]))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::MissingReference { entity: "Speaker", .. }));
    let unchanged = ctx.repo.find_event(created.event.id).await.unwrap().unwrap();
    assert_eq!(unchanged.speaker_ids(), BTreeSet::from([john.id, jane.id]));

    // Drop john, keep jane.
    let updated = ctx
        .repo
        .update_event(created.event.id, &draft("Renombrado"), category.id, &BTreeSet::from([jane.id]))
        .await
        .unwrap()
        .expect("event exists");
    assert_eq!(updated.event.name, "Renombrado");
    assert_eq!(updated.speaker_ids(), BTreeSet::from([jane.id]));

    // A linked speaker cannot be removed.
    let err = ctx.repo.delete_speaker(jane.id).await.unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));

    assert!(ctx.repo.delete_event(created.event.id).await.unwrap());
    assert!(ctx.repo.find_event(created.event.id).await.unwrap().is_none());
    assert!(ctx.repo.delete_speaker(jane.id).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_unique_constraints_map_to_conflict() {
    let ctx = DbTestContext::setup().await;
    ctx.category("Duplicada").await;

    let err = ctx
        .repo
        .insert_category(&NewCategory {
            name: ctx.unique("Duplicada"),
            description: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));
}

#[tokio::test]
#[ignore]
async fn test_page_filter_escapes_wildcards() {
    let ctx = DbTestContext::setup().await;
    let category = ctx.category("Webinar").await;
    let marker = ctx.unique("pct");

    for name in [format!("{marker} 100% online"), format!("{marker} 100 online")] {
        ctx.repo
            .insert_event(&draft(&name), category.id, &BTreeSet::new())
            .await
            .unwrap();
    }

    let request = PageRequest::new(0, 10, Sort::default());
    let (rows, total) = ctx
        .repo
        .page_events(Some(&format!("{marker} 100%")), &request)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].event.name, format!("{marker} 100% online"));
}

#[tokio::test]
#[ignore]
async fn test_attendance_and_strategies_agree() {
    let ctx = DbTestContext::setup().await;
    let category = ctx.category("Conferencia").await;
    let speaker = ctx.speaker("ana").await;
    let role = match ctx.repo.find_role_by_name("ROLE_USER").await.unwrap() {
        Some(role) => role,
        None => ctx.repo.insert_role("ROLE_USER").await.unwrap(),
    };
    let username: String = ctx.tag.chars().rev().take(18).collect();
    let user = ctx
        .repo
        .insert_user(&NewUser {
            name: "Test".into(),
            username: format!("u{username}"),
            email: format!("{}@test.com", ctx.unique("user")),
            password_hash: "hash".into(),
            role_ids: BTreeSet::from([role.id]),
        })
        .await
        .unwrap();

    let event = ctx
        .repo
        .insert_event(&draft(&ctx.unique("Asistencia")), category.id, &BTreeSet::from([speaker.id]))
        .await
        .unwrap();
    let id = event.event.id;

    assert!(ctx.repo.add_attendee(id, user.id).await.unwrap());
    // Attending twice keeps a single link.
    assert!(ctx.repo.add_attendee(id, user.id).await.unwrap());
    assert_eq!(ctx.repo.attendees_of_event(id).await.unwrap().len(), 1);
    assert_eq!(ctx.repo.attended_events(user.id).await.unwrap()[0].id, id);

    let joined = ctx.repo.list_events_with_category_and_speakers().await.unwrap();
    let full = ctx.repo.list_events_with_all_details().await.unwrap();
    let joined = joined.into_iter().find(|d| d.event.id == id).unwrap();
    let full = full.into_iter().find(|d| d.event.id == id).unwrap();

    assert_eq!(joined.speakers, full.speakers);
    assert!(joined.attendees.is_none());
    assert_eq!(full.attendees.as_ref().map(Vec::len), Some(1));

    assert!(ctx.repo.remove_attendee(id, user.id).await.unwrap());
    assert!(ctx.repo.delete_event(id).await.unwrap());
    assert!(!ctx.repo.add_attendee(id, user.id).await.unwrap());
}
