use crate::{
    domain::{Id, NewCategory},
    error::ApiError,
    models::{CategoryRequest, CategoryResponse},
    repository::Repository,
    validation::Validate,
};

const RESOURCE: &str = "Category";

pub async fn find_all(repo: &dyn Repository) -> Result<Vec<CategoryResponse>, ApiError> {
    let categories = repo.list_categories().await?;
    tracing::debug!("Found {} categories", categories.len());
    Ok(categories.into_iter().map(Into::into).collect())
}

pub async fn find_by_id(repo: &dyn Repository, id: Id) -> Result<CategoryResponse, ApiError> {
    repo.find_category(id)
        .await?
        .map(Into::into)
        .ok_or_else(|| {
            tracing::warn!("Category {} not found", id);
            ApiError::not_found(RESOURCE, id)
        })
}

/// Name uniqueness is left to storage, which answers with a conflict.
pub async fn create(repo: &dyn Repository, req: &CategoryRequest) -> Result<CategoryResponse, ApiError> {
    req.validate()?;
    let created = repo.insert_category(&NewCategory::from(req)).await?;
    tracing::info!("Category '{}' saved with id {}", created.name, created.id);
    Ok(created.into())
}

pub async fn update(
    repo: &dyn Repository,
    id: Id,
    req: &CategoryRequest,
) -> Result<CategoryResponse, ApiError> {
    req.validate()?;
    let updated = repo
        .update_category(id, &NewCategory::from(req))
        .await?
        .ok_or_else(|| ApiError::not_found(RESOURCE, id))?;
    tracing::info!("Category {} updated", id);
    Ok(updated.into())
}

pub async fn delete_by_id(repo: &dyn Repository, id: Id) -> Result<(), ApiError> {
    if !repo.delete_category(id).await? {
        return Err(ApiError::not_found(RESOURCE, id));
    }
    tracing::info!("Category {} deleted", id);
    Ok(())
}
