use std::collections::BTreeSet;

use crate::{
    auth::{self, AuthUser},
    config::AppConfig,
    domain::{NewUser, ROLE_USER},
    error::ApiError,
    mapper::user_response,
    models::{AuthResponse, LoginRequest, RegisterRequest, UserResponse},
    repository::Repository,
    validation::Validate,
};

const TOKEN_TYPE: &str = "Bearer";

/// login
///
/// Checks the credentials against the stored hash and issues an access token.
/// Unknown usernames and wrong passwords are indistinguishable to the caller.
pub async fn login(
    repo: &dyn Repository,
    config: &AppConfig,
    req: &LoginRequest,
) -> Result<AuthResponse, ApiError> {
    req.validate()?;

    let Some(user) = repo.find_user_by_username(&req.username).await? else {
        tracing::warn!("Login attempt for unknown user '{}'", req.username);
        return Err(ApiError::Unauthorized);
    };

    if !auth::verify_password(req.password.clone(), user.password_hash.clone()).await? {
        tracing::warn!("Bad password for user '{}'", req.username);
        return Err(ApiError::Unauthorized);
    }

    let access_token = auth::issue_token(&user.username, config)?;
    tracing::info!("User '{}' logged in", user.username);
    Ok(AuthResponse {
        access_token,
        token_type: TOKEN_TYPE.to_string(),
    })
}

/// register
///
/// Creates an account. Duplicate usernames are checked before duplicate
/// emails, and both are rejected before anything is written.
pub async fn register(repo: &dyn Repository, req: &RegisterRequest) -> Result<UserResponse, ApiError> {
    req.validate()?;

    if repo.username_exists(&req.username).await? {
        return Err(ApiError::BadRequest("Username is already taken!".into()));
    }
    if repo.email_exists(&req.email).await? {
        return Err(ApiError::BadRequest("Email is already in use!".into()));
    }

    let requested: BTreeSet<String> = match &req.roles {
        Some(roles) if !roles.is_empty() => roles.clone(),
        _ => BTreeSet::from([ROLE_USER.to_string()]),
    };
    let mut role_ids = BTreeSet::new();
    for name in &requested {
        let role = repo
            .find_role_by_name(name)
            .await?
            .ok_or_else(|| ApiError::not_found("Role", name))?;
        role_ids.insert(role.id);
    }

    let password_hash = auth::hash_password(req.password.clone()).await?;
    let user = repo
        .insert_user(&NewUser {
            name: req.name.trim().to_string(),
            username: req.username.clone(),
            email: req.email.trim().to_string(),
            password_hash,
            role_ids,
        })
        .await?;

    tracing::info!("User '{}' registered with id {}", user.username, user.id);
    Ok(user_response(user, Vec::new()))
}

/// Profile of the caller, including the events they attend.
pub async fn profile(repo: &dyn Repository, caller: &AuthUser) -> Result<UserResponse, ApiError> {
    let user = repo
        .find_user_by_username(&caller.username)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    let attended = repo.attended_events(user.id).await?;
    Ok(user_response(user, attended))
}
