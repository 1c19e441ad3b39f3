use events_api::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    memory::InMemoryRepository,
    repository::{PostgresRepository, RepositoryState},
    seed,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, connects storage (Postgres, or
/// the in-memory store when running locally without `DATABASE_URL`), seeds
/// demo data if enabled and serves the HTTP API.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise verbose defaults for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "events_api=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Storage
    let repo: RepositoryState = match &config.db_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_db_connections)
                .connect(url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let postgres = PostgresRepository::new(pool);
            postgres
                .migrate()
                .await
                .expect("FATAL: Failed to apply database migrations.");
            Arc::new(postgres)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store. Data is lost on exit.");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 4. Demo data
    if config.seed_data {
        seed::load_demo_data(repo.as_ref())
            .await
            .expect("FATAL: Failed to load seed data.");
    }

    // 5. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState { repo, config });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Cannot bind {bind_addr}: {e}"));

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
