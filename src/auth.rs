use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    domain::{Id, ROLE_ADMIN, ROLE_USER},
    error::ApiError,
    repository::RepositoryState,
};

/// Claims
///
/// Payload of every issued access token, signed with the configured HS256 secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the username the token was issued to.
    pub sub: String,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Roles are re-read from
/// storage on every request, so revoking a role takes effect immediately.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Id,
    pub username: String,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }

    /// Any account allowed to read the catalogue.
    pub fn is_reader(&self) -> bool {
        self.has_role(ROLE_ADMIN) || self.has_role(ROLE_USER)
    }
}

/// issue_token
///
/// Signs a token for `username` valid for the configured lifetime.
pub fn issue_token(username: &str, config: &AppConfig) -> Result<String, ApiError> {
    let now = chrono::Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        sub: username.to_string(),
        iat: now,
        exp: now + (config.jwt_expiration_ms / 1000) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
}

/// decode_token
///
/// Verifies signature and expiry. Every failure maps to 401.
pub fn decode_token(token: &str, config: &AppConfig) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        match e.kind() {
            ErrorKind::ExpiredSignature => tracing::debug!("Rejected expired token"),
            other => tracing::debug!("Rejected token: {:?}", other),
        }
        ApiError::Unauthorized
    })
}

/// hash_password
///
/// Argon2 with a fresh random salt. Runs on the blocking pool since hashing
/// is deliberately slow.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt: [u8; 16] = rand::thread_rng().r#gen();
        argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
    .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// Malformed hashes verify as false.
pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || {
        argon2::verify_encoded(&hash, password.as_bytes()).unwrap_or(false)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("verification task failed: {e}")))
}

/// AuthUser Extractor
///
/// Resolves the caller from an `Authorization: Bearer <token>` header. When an
/// auth middleware already ran for the route, its result is reused from the
/// request extensions instead of decoding the token twice.
///
/// Rejection: `ApiError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let claims = decode_token(token, &config)?;

        // The account may have been removed after the token was issued.
        let user = repo
            .find_user_by_username(&claims.sub)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(AuthUser {
            id: user.id,
            roles: user.role_names(),
            username: user.username,
        })
    }
}

/// AdminUser
///
/// An authenticated caller holding `ROLE_ADMIN`. Rejects with 403 otherwise.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!("User '{}' denied admin access", user.username);
            return Err(ApiError::Forbidden);
        }
        Ok(Self(user))
    }
}

/// ReaderUser
///
/// An authenticated caller holding `ROLE_ADMIN` or `ROLE_USER`.
#[derive(Debug, Clone)]
pub struct ReaderUser(pub AuthUser);

impl<S> FromRequestParts<S> for ReaderUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_reader() {
            tracing::warn!("User '{}' has no reader role", user.username);
            return Err(ApiError::Forbidden);
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let config = AppConfig::default();
        let token = issue_token("admin", &config).unwrap();
        let claims = decode_token(&token, &config).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.exp - claims.iat, 86_400);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = AppConfig::default();
        let token = issue_token("admin", &config).unwrap();
        let other = AppConfig {
            jwt_secret: "a-completely-different-secret-value".into(),
            ..AppConfig::default()
        };
        assert!(matches!(decode_token(&token, &other), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = AppConfig::default();
        let past = chrono::Utc::now().timestamp() as usize - 3600;
        let claims = Claims {
            sub: "admin".into(),
            iat: past - 60,
            exp: past,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();
        assert!(matches!(decode_token(&token, &config), Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let hash = hash_password("user1234".into()).await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("user1234".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".into(), hash).await.unwrap());
        assert!(!verify_password("x".into(), "not-a-hash".into()).await.unwrap());
    }

    #[test]
    fn role_checks() {
        let user = AuthUser {
            id: 1,
            username: "user".into(),
            roles: vec![ROLE_USER.into()],
        };
        assert!(user.is_reader());
        assert!(!user.is_admin());
    }
}
