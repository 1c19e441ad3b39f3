use crate::{
    domain::{Id, NewSpeaker},
    error::ApiError,
    models::{SpeakerRequest, SpeakerResponse},
    repository::Repository,
    validation::Validate,
};

const RESOURCE: &str = "Speaker";

pub async fn find_all(repo: &dyn Repository) -> Result<Vec<SpeakerResponse>, ApiError> {
    let speakers = repo.list_speakers().await?;
    Ok(speakers.into_iter().map(Into::into).collect())
}

pub async fn find_by_id(repo: &dyn Repository, id: Id) -> Result<SpeakerResponse, ApiError> {
    repo.find_speaker(id)
        .await?
        .map(Into::into)
        .ok_or_else(|| ApiError::not_found(RESOURCE, id))
}

/// Email uniqueness is left to storage, which answers with a conflict.
pub async fn create(repo: &dyn Repository, req: &SpeakerRequest) -> Result<SpeakerResponse, ApiError> {
    req.validate()?;
    let created = repo.insert_speaker(&NewSpeaker::from(req)).await?;
    tracing::info!("Speaker '{}' saved with id {}", created.name, created.id);
    Ok(created.into())
}

pub async fn update(
    repo: &dyn Repository,
    id: Id,
    req: &SpeakerRequest,
) -> Result<SpeakerResponse, ApiError> {
    req.validate()?;
    let updated = repo
        .update_speaker(id, &NewSpeaker::from(req))
        .await?
        .ok_or_else(|| ApiError::not_found(RESOURCE, id))?;
    tracing::info!("Speaker {} updated", id);
    Ok(updated.into())
}

/// A speaker still linked to an event cannot be removed (409).
pub async fn delete_by_id(repo: &dyn Repository, id: Id) -> Result<(), ApiError> {
    if !repo.delete_speaker(id).await? {
        return Err(ApiError::not_found(RESOURCE, id));
    }
    tracing::info!("Speaker {} deleted", id);
    Ok(())
}
