use std::env;

const LOCAL_JWT_SECRET: &str = "local-dev-jwt-secret-change-me-0123456789abcdef";
const DEFAULT_JWT_EXPIRATION_MS: u64 = 86_400_000;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_DB_CONNECTIONS: u32 = 5;

/// AppConfig
///
/// The application's configuration, loaded once at startup and shared
/// read-only through the application state via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format, seeding default and secret requirements.
    pub env: Env,
    // Postgres connection string. `None` locally means the in-memory store is used.
    pub db_url: Option<String>,
    // HS256 signing key for issued access tokens.
    pub jwt_secret: String,
    // Access token lifetime in milliseconds.
    pub jwt_expiration_ms: u64,
    pub bind_addr: String,
    // Load roles, demo accounts and sample events at startup.
    pub seed_data: bool,
    pub max_db_connections: u32,
}

/// Env
///
/// Runtime context: developer machine or hardened deployment.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe values for test scaffolding; never reads the environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            jwt_expiration_ms: DEFAULT_JWT_EXPIRATION_MS,
            bind_addr: "127.0.0.1:0".to_string(),
            seed_data: false,
            max_db_connections: DEFAULT_MAX_DB_CONNECTIONS,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {key} has an invalid value: {raw}")),
        Err(_) => default,
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables (after `.env` has been
    /// applied by the caller).
    ///
    /// # Panics
    /// Panics if a variable required for the current environment is missing or
    /// malformed, so the service never starts half-configured.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").unwrap_or_default().as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                Some(env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in production")),
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
                env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        Self {
            env,
            db_url,
            jwt_secret,
            jwt_expiration_ms: parse_or("JWT_EXPIRATION_MS", DEFAULT_JWT_EXPIRATION_MS),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            seed_data: parse_or("SEED_DATA", env == Env::Local),
            max_db_connections: parse_or("DB_MAX_CONNECTIONS", DEFAULT_MAX_DB_CONNECTIONS),
        }
    }
}
