use axum::{
    Json,
    body::to_bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use events_api::{
    AppState, InMemoryRepository,
    auth::AuthUser,
    config::AppConfig,
    domain::{NewCategory, NewSpeaker, ROLE_ADMIN, ROLE_USER},
    extract::{ApiJson, ApiPath, ApiQuery},
    handlers,
    models::{
        CategoryRequest, EventPageQuery, EventRequest, LoginRequest, RegisterRequest,
        SpeakerRequest,
    },
    repository::{RepositoryState, Repository},
};
use std::collections::BTreeSet;
use std::sync::Arc;

// --- FIXTURE ---

struct Fixture {
    state: AppState,
    repo: Arc<InMemoryRepository>,
    taller: i64,
    webinar: i64,
    john: i64,
    jane: i64,
}

async fn fixture() -> Fixture {
    let repo = Arc::new(InMemoryRepository::new());
    repo.insert_role(ROLE_ADMIN).await.unwrap();
    repo.insert_role(ROLE_USER).await.unwrap();

    let taller = repo
        .insert_category(&NewCategory { name: "Taller".into(), description: "Eventos interactivos y prácticos.".into() })
        .await
        .unwrap();
    let webinar = repo
        .insert_category(&NewCategory { name: "Webinar".into(), description: "Seminarios online en vivo.".into() })
        .await
        .unwrap();
    let john = repo
        .insert_speaker(&NewSpeaker { name: "John Doe".into(), email: "john.doe@example.com".into(), bio: None })
        .await
        .unwrap();
    let jane = repo
        .insert_speaker(&NewSpeaker { name: "Jane Smith".into(), email: "jane.smith@example.com".into(), bio: None })
        .await
        .unwrap();

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        config: AppConfig::default(),
    };
    Fixture { state, repo, taller: taller.id, webinar: webinar.id, john: john.id, jane: jane.id }
}

fn event_request(name: &str, category_id: i64, speakers: &[i64]) -> EventRequest {
    EventRequest {
        name: name.into(),
        date: NaiveDate::from_ymd_opt(2025, 9, 15),
        location: "Sala 3".into(),
        category_id: Some(category_id),
        speakers_ids: Some(speakers.iter().copied().collect()),
    }
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create(f: &Fixture, req: EventRequest) -> i64 {
    let (status, Json(event)) = handlers::create_event(State(f.state.clone()), ApiJson(req))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    event.id
}

// --- EVENTS ---

#[tokio::test]
async fn test_get_event_unknown_id_is_404() {
    let f = fixture().await;
    let response = handlers::get_event(State(f.state.clone()), ApiPath(999))
        .await
        .into_response();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["status"], 404);
    assert_eq!(body["message"], "Event not found with id: 999");
}

#[tokio::test]
async fn test_create_event_links_speakers() {
    let f = fixture().await;
    let id = create(&f, event_request("Rust Workshop", f.taller, &[f.john, f.jane])).await;

    let Json(event) = handlers::get_event(State(f.state.clone()), ApiPath(id)).await.unwrap();
    assert_eq!(event.name, "Rust Workshop");
    assert_eq!(event.category_name, "Taller");
    let speaker_ids: BTreeSet<i64> = event.speakers.iter().map(|s| s.id).collect();
    assert_eq!(speaker_ids, BTreeSet::from([f.john, f.jane]));
}

#[tokio::test]
async fn test_create_event_unknown_category_writes_nothing() {
    let f = fixture().await;
    let response = handlers::create_event(State(f.state.clone()), ApiJson(event_request("Ghost", 77, &[])))
        .await
        .into_response();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Category not found with id: 77");
    assert_eq!(f.repo.count_events().await.unwrap(), 0);
}

#[tokio::test]
async fn test_create_event_unknown_speaker_writes_nothing() {
    let f = fixture().await;
    let response = handlers::create_event(
        State(f.state.clone()),
        ApiJson(event_request("Ghost", f.taller, &[f.john, 404])),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(f.repo.count_events().await.unwrap(), 0);
    assert!(f.repo.speakers_of_event(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_event_validation_errors() {
    let f = fixture().await;
    let response = handlers::create_event(State(f.state.clone()), ApiJson(EventRequest::default()))
        .await
        .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["errors"]["name"], "Event name must not be blank.");
    assert_eq!(body["errors"]["categoryId"], "Category is required.");
}

#[tokio::test]
async fn test_update_event_same_speakers_twice_is_idempotent() {
    let f = fixture().await;
    let id = create(&f, event_request("Rust Workshop", f.taller, &[f.john])).await;

    let target = event_request("Rust Workshop II", f.webinar, &[f.jane]);
    let Json(first) = handlers::update_event(State(f.state.clone()), ApiPath(id), ApiJson(target.clone()))
        .await
        .unwrap();
    let Json(second) = handlers::update_event(State(f.state.clone()), ApiPath(id), ApiJson(target))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(second.category_name, "Webinar");
    assert_eq!(second.speakers.len(), 1);
    assert_eq!(second.speakers[0].id, f.jane);
}

#[tokio::test]
async fn test_update_event_unknown_id_is_404() {
    let f = fixture().await;
    let response = handlers::update_event(
        State(f.state.clone()),
        ApiPath(4242),
        ApiJson(event_request("Nowhere", f.taller, &[f.john])),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Event not found with id: 4242");
    assert_eq!(f.repo.count_events().await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_event_unknown_category_changes_nothing() {
    let f = fixture().await;
    let id = create(&f, event_request("Rust Workshop", f.taller, &[f.john])).await;

    let response = handlers::update_event(
        State(f.state.clone()),
        ApiPath(id),
        ApiJson(event_request("Renamed", 999, &[f.jane])),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Category not found with id: 999");

    let Json(event) = handlers::get_event(State(f.state.clone()), ApiPath(id)).await.unwrap();
    assert_eq!(event.name, "Rust Workshop");
    assert_eq!(event.category_id, f.taller);
    let speaker_ids: Vec<i64> = event.speakers.iter().map(|s| s.id).collect();
    assert_eq!(speaker_ids, vec![f.john]);
}

#[tokio::test]
async fn test_update_event_unknown_speaker_changes_nothing() {
    let f = fixture().await;
    let id = create(&f, event_request("Rust Workshop", f.taller, &[f.john])).await;

    let response = handlers::update_event(
        State(f.state.clone()),
        ApiPath(id),
        ApiJson(event_request("Renamed", f.webinar, &[f.jane, 777])),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Speaker not found with id: 777");

    let Json(event) = handlers::get_event(State(f.state.clone()), ApiPath(id)).await.unwrap();
    assert_eq!(event.name, "Rust Workshop");
    assert_eq!(event.category_name, "Taller");
    let speaker_ids: Vec<i64> = event.speakers.iter().map(|s| s.id).collect();
    assert_eq!(speaker_ids, vec![f.john]);
    assert!(f.repo.speakers_of_event(id).await.unwrap().iter().all(|s| s.id != f.jane));
}

#[tokio::test]
async fn test_update_event_without_speakers_clears_them() {
    let f = fixture().await;
    let id = create(&f, event_request("Rust Workshop", f.taller, &[f.john, f.jane])).await;

    let mut req = event_request("Rust Workshop", f.taller, &[]);
    req.speakers_ids = None;
    let Json(updated) = handlers::update_event(State(f.state.clone()), ApiPath(id), ApiJson(req))
        .await
        .unwrap();
    assert!(updated.speakers.is_empty());
}

#[tokio::test]
async fn test_delete_event_unknown_is_404() {
    let f = fixture().await;
    let response = handlers::delete_event(State(f.state.clone()), ApiPath(12345))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_event_releases_speaker() {
    let f = fixture().await;
    let id = create(&f, event_request("Rust Workshop", f.taller, &[f.john])).await;

    // Linked speaker cannot be removed while the event exists.
    let response = handlers::delete_speaker(State(f.state.clone()), ApiPath(f.john))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let status = handlers::delete_event(State(f.state.clone()), ApiPath(id)).await.unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let status = handlers::delete_speaker(State(f.state.clone()), ApiPath(f.john)).await.unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_list_events_filters_by_name() {
    let f = fixture().await;
    create(&f, event_request("Webinar de Spring Security", f.webinar, &[])).await;
    create(&f, event_request("Conferencia Cloud Nativo", f.taller, &[])).await;

    let query = EventPageQuery {
        name: Some("Spring".into()),
        ..Default::default()
    };
    let Json(page) = handlers::list_events(State(f.state.clone()), ApiQuery(query)).await.unwrap();

    assert_eq!(page.total_elements, 1);
    assert_eq!(page.content.len(), 1);
    assert_eq!(page.content[0].name, "Webinar de Spring Security");
    assert!(page.last);
}

#[tokio::test]
async fn test_list_events_name_filter_is_not_trimmed() {
    let f = fixture().await;
    create(&f, event_request("Webinar de Spring Security", f.webinar, &[])).await;
    create(&f, event_request("Conferencia Cloud Nativo", f.taller, &[])).await;

    let page_for = |name: &str| EventPageQuery {
        name: Some(name.into()),
        ..Default::default()
    };

    // Nothing follows "Security", so the trailing space rules it out.
    let Json(page) = handlers::list_events(State(f.state.clone()), ApiQuery(page_for("security ")))
        .await
        .unwrap();
    assert_eq!(page.total_elements, 0);

    let Json(page) = handlers::list_events(State(f.state.clone()), ApiQuery(page_for("security")))
        .await
        .unwrap();
    assert_eq!(page.total_elements, 1);

    // Blank means no filter at all.
    let Json(page) = handlers::list_events(State(f.state.clone()), ApiQuery(page_for("   ")))
        .await
        .unwrap();
    assert_eq!(page.total_elements, 2);
}

#[tokio::test]
async fn test_list_events_name_sort_ignores_case() {
    let f = fixture().await;
    for name in ["beta", "Alpha", "charlie"] {
        create(&f, event_request(name, f.taller, &[])).await;
    }

    let query = EventPageQuery {
        sort: Some("name,asc".into()),
        ..Default::default()
    };
    let Json(page) = handlers::list_events(State(f.state.clone()), ApiQuery(query)).await.unwrap();
    let names: Vec<&str> = page.content.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "beta", "charlie"]);
}

#[tokio::test]
async fn test_list_events_paginates() {
    let f = fixture().await;
    for i in 0..5 {
        create(&f, event_request(&format!("Evento {i}"), f.taller, &[])).await;
    }

    let query = EventPageQuery {
        page: Some(1),
        size: Some(2),
        sort: Some("name,desc".into()),
        ..Default::default()
    };
    let response = handlers::list_events(State(f.state.clone()), ApiQuery(query))
        .await
        .into_response();
    let body = json_body(response).await;

    assert_eq!(body["totalElements"], 5);
    assert_eq!(body["totalPages"], 3);
    assert_eq!(body["pageNumber"], 1);
    assert_eq!(body["last"], false);
    assert_eq!(body["content"][0]["name"], "Evento 2");
}

#[tokio::test]
async fn test_list_events_unknown_sort_is_400() {
    let f = fixture().await;
    let query = EventPageQuery {
        sort: Some("password".into()),
        ..Default::default()
    };
    let response = handlers::list_events(State(f.state.clone()), ApiQuery(query))
        .await
        .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["errors"]["sort"].as_str().unwrap().contains("password"));
}

// --- FETCH STRATEGIES ---

#[tokio::test]
async fn test_strategies_report_round_trips() {
    let f = fixture().await;
    create(&f, event_request("A", f.taller, &[f.john])).await;
    create(&f, event_request("B", f.webinar, &[f.john, f.jane])).await;

    let naive = handlers::list_events_problematic(State(f.state.clone()))
        .await
        .unwrap()
        .into_response();
    assert_eq!(naive.headers()[handlers::ROUND_TRIPS_HEADER], "7");

    let join = handlers::list_events_join_fetch(State(f.state.clone()))
        .await
        .unwrap()
        .into_response();
    assert_eq!(join.headers()[handlers::ROUND_TRIPS_HEADER], "1");

    let body = json_body(join).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert!(body[0].get("attendedUsers").is_none());
    assert_eq!(body[1]["speakers"].as_array().unwrap().len(), 2);

    let all = handlers::list_events_all_details(State(f.state.clone()))
        .await
        .unwrap()
        .into_response();
    let body = json_body(all).await;
    assert_eq!(body[0]["attendedUsers"], serde_json::json!([]));
}

// --- CATEGORIES & SPEAKERS ---

#[tokio::test]
async fn test_category_crud() {
    let f = fixture().await;
    let req = CategoryRequest { name: "Meetup".into(), description: "Encuentros locales.".into() };
    let (status, Json(created)) = handlers::create_category(State(f.state.clone()), ApiJson(req))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let req = CategoryRequest { name: "Meetup".into(), description: "Otra vez.".into() };
    let response = handlers::create_category(State(f.state.clone()), ApiJson(req))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let req = CategoryRequest { name: "Meetups".into(), description: String::new() };
    let Json(updated) = handlers::update_category(State(f.state.clone()), ApiPath(created.id), ApiJson(req))
        .await
        .unwrap();
    assert_eq!(updated.name, "Meetups");

    let Json(all) = handlers::list_categories(State(f.state.clone())).await.unwrap();
    assert_eq!(all.len(), 3);

    let status = handlers::delete_category(State(f.state.clone()), ApiPath(created.id)).await.unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let response = handlers::get_category(State(f.state.clone()), ApiPath(created.id))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_referenced_category_is_conflict() {
    let f = fixture().await;
    create(&f, event_request("A", f.taller, &[])).await;

    let response = handlers::delete_category(State(f.state.clone()), ApiPath(f.taller))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Data Conflict");
}

#[tokio::test]
async fn test_speaker_duplicate_email_is_conflict() {
    let f = fixture().await;
    let req = SpeakerRequest {
        name: "Johnny".into(),
        email: "john.doe@example.com".into(),
        bio: None,
    };
    let response = handlers::create_speaker(State(f.state.clone()), ApiJson(req))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let Json(speaker) = handlers::get_speaker(State(f.state.clone()), ApiPath(f.john)).await.unwrap();
    assert_eq!(speaker.name, "John Doe");
}

#[tokio::test]
async fn test_update_category_and_speaker_unknown_id_is_404() {
    let f = fixture().await;
    let req = CategoryRequest { name: "Meetup".into(), description: String::new() };
    let response = handlers::update_category(State(f.state.clone()), ApiPath(321), ApiJson(req))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["message"], "Category not found with id: 321");

    let req = SpeakerRequest {
        name: "Nadie".into(),
        email: "nadie@example.com".into(),
        bio: None,
    };
    let response = handlers::update_speaker(State(f.state.clone()), ApiPath(654), ApiJson(req))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["message"], "Speaker not found with id: 654");

    let Json(all) = handlers::list_categories(State(f.state.clone())).await.unwrap();
    assert_eq!(all.len(), 2);
    let Json(all) = handlers::list_speakers(State(f.state.clone())).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_get_speaker_unknown_is_404() {
    let f = fixture().await;
    let response = handlers::get_speaker(State(f.state.clone()), ApiPath(55))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// --- AUTH ---

fn register_request(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.into(),
        password: "secreto1".into(),
        email: email.into(),
        name: "Ana García".into(),
        roles: None,
    }
}

#[tokio::test]
async fn test_register_then_login() {
    let f = fixture().await;
    let (status, Json(user)) =
        handlers::register(State(f.state.clone()), ApiJson(register_request("anagarcia", "ana@example.com")))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user.roles, vec![ROLE_USER.to_string()]);

    let login = LoginRequest { username: "anagarcia".into(), password: "secreto1".into() };
    let Json(token) = handlers::login(State(f.state.clone()), ApiJson(login)).await.unwrap();
    assert_eq!(token.token_type, "Bearer");
    assert!(!token.access_token.is_empty());

    let login = LoginRequest { username: "anagarcia".into(), password: "wrong-pass".into() };
    let response = handlers::login(State(f.state.clone()), ApiJson(login)).await.into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_duplicate_username_is_400_without_write() {
    let f = fixture().await;
    let (status, _) =
        handlers::register(State(f.state.clone()), ApiJson(register_request("anagarcia", "ana@example.com")))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let response = handlers::register(
        State(f.state.clone()),
        ApiJson(register_request("anagarcia", "other@example.com")),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!f.repo.email_exists("other@example.com").await.unwrap());
}

#[tokio::test]
async fn test_register_unknown_role_is_404() {
    let f = fixture().await;
    let mut req = register_request("anagarcia", "ana@example.com");
    req.roles = Some(BTreeSet::from(["ROLE_SUPERUSER".to_string()]));

    let response = handlers::register(State(f.state.clone()), ApiJson(req)).await.into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!f.repo.username_exists("anagarcia").await.unwrap());
}

#[tokio::test]
async fn test_attendance_shows_on_profile() {
    let f = fixture().await;
    let event_id = create(&f, event_request("Rust Workshop", f.taller, &[])).await;
    let (_, Json(user)) =
        handlers::register(State(f.state.clone()), ApiJson(register_request("anagarcia", "ana@example.com")))
            .await
            .unwrap();

    let caller = AuthUser { id: user.id, username: user.username.clone(), roles: user.roles.clone() };

    for _ in 0..2 {
        let status = handlers::attend_event(caller.clone(), State(f.state.clone()), ApiPath(event_id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let Json(profile) = handlers::get_me(caller.clone(), State(f.state.clone())).await.unwrap();
    assert_eq!(profile.attended_events.len(), 1);
    assert_eq!(profile.attended_events[0].id, event_id);

    let response = handlers::attend_event(caller.clone(), State(f.state.clone()), ApiPath(999))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    handlers::unattend_event(caller.clone(), State(f.state.clone()), ApiPath(event_id))
        .await
        .unwrap();
    let Json(profile) = handlers::get_me(caller, State(f.state.clone())).await.unwrap();
    assert!(profile.attended_events.is_empty());
}
