//! Startup data loader: roles, demo accounts, categories, speakers and a batch
//! of sample events. Every step looks its record up first, so running the
//! loader against an already seeded store changes nothing.

use chrono::{Days, Local, NaiveDate};
use std::collections::BTreeSet;

use crate::{
    auth,
    domain::{Category, EventDraft, Id, NewCategory, NewSpeaker, NewUser, ROLE_ADMIN, ROLE_USER, Role, Speaker},
    error::ApiError,
    repository::Repository,
};

const SAMPLE_EVENT_COUNT: u64 = 60;

async fn ensure_role(repo: &dyn Repository, name: &str) -> Result<Role, ApiError> {
    match repo.find_role_by_name(name).await? {
        Some(role) => Ok(role),
        None => Ok(repo.insert_role(name).await?),
    }
}

async fn ensure_user(
    repo: &dyn Repository,
    name: &str,
    username: &str,
    email: &str,
    password: &str,
    role_ids: BTreeSet<Id>,
) -> Result<(), ApiError> {
    if repo.username_exists(username).await? {
        return Ok(());
    }
    let password_hash = auth::hash_password(password.to_string()).await?;
    repo.insert_user(&NewUser {
        name: name.to_string(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash,
        role_ids,
    })
    .await?;
    tracing::info!("Seeded user '{}'", username);
    Ok(())
}

async fn ensure_category(repo: &dyn Repository, name: &str, description: &str) -> Result<Category, ApiError> {
    match repo.find_category_by_name(name).await? {
        Some(category) => Ok(category),
        None => Ok(repo
            .insert_category(&NewCategory {
                name: name.to_string(),
                description: description.to_string(),
            })
            .await?),
    }
}

async fn ensure_speaker(repo: &dyn Repository, name: &str, email: &str, bio: &str) -> Result<Speaker, ApiError> {
    match repo.find_speaker_by_email(email).await? {
        Some(speaker) => Ok(speaker),
        None => Ok(repo
            .insert_speaker(&NewSpeaker {
                name: name.to_string(),
                email: email.to_string(),
                bio: Some(bio.to_string()),
            })
            .await?),
    }
}

/// Sample event `i` (1-based): rotating category, location and speakers.
fn sample_event(
    i: u64,
    base: NaiveDate,
    categories: [&Category; 3],
    john: &Speaker,
    jane: &Speaker,
) -> (EventDraft, Id, BTreeSet<Id>) {
    let draft = EventDraft {
        name: format!("Evento {i:02}: Conferencia de Tecnología {}", i % 5 + 1),
        date: base.checked_add_days(Days::new(i)).unwrap_or(base),
        location: format!("Sala {}", i % 10 + 1),
    };
    let [conferencia, taller, webinar] = categories;
    let category = match i % 3 {
        0 => conferencia,
        1 => taller,
        _ => webinar,
    };

    let mut speakers = BTreeSet::from([if i % 2 == 0 { john.id } else { jane.id }]);
    if i % 5 == 0 {
        speakers.insert(john.id);
        speakers.insert(jane.id);
    }
    (draft, category.id, speakers)
}

/// load_demo_data
///
/// Creates `ROLE_ADMIN`/`ROLE_USER`, the `admin`/`admin1234` (both roles) and
/// `user`/`user1234` accounts, three categories, two speakers and, only when
/// no event exists yet, sixty sample events dated from tomorrow onwards.
pub async fn load_demo_data(repo: &dyn Repository) -> Result<(), ApiError> {
    let admin_role = ensure_role(repo, ROLE_ADMIN).await?;
    let user_role = ensure_role(repo, ROLE_USER).await?;

    ensure_user(
        repo,
        "Administrador",
        "admin",
        "admin@example.com",
        "admin1234",
        BTreeSet::from([admin_role.id, user_role.id]),
    )
    .await?;
    ensure_user(
        repo,
        "Usuario",
        "user",
        "user@example.com",
        "user1234",
        BTreeSet::from([user_role.id]),
    )
    .await?;

    let conferencia = ensure_category(repo, "Conferencia", "Eventos de gran escala con múltiples oradores.").await?;
    let taller = ensure_category(repo, "Taller", "Eventos interactivos y prácticos.").await?;
    let webinar = ensure_category(repo, "Webinar", "Seminarios online en vivo.").await?;

    let john = ensure_speaker(repo, "John Doe", "john.doe@example.com", "Experto en desarrollo de software.").await?;
    let jane = ensure_speaker(repo, "Jane Smith", "jane.smith@example.com", "Especialista en marketing digital.").await?;

    if repo.count_events().await? > 0 {
        tracing::debug!("Events already present, skipping sample events");
        return Ok(());
    }

    let today = Local::now().date_naive();
    for i in 1..=SAMPLE_EVENT_COUNT {
        let (draft, category_id, speakers) =
            sample_event(i, today, [&conferencia, &taller, &webinar], &john, &jane);
        repo.insert_event(&draft, category_id, &speakers).await?;
    }
    tracing::info!("Seeded {} sample events", SAMPLE_EVENT_COUNT);
    Ok(())
}
