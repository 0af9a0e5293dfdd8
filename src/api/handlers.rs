use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::config::PaginationConfig;
use crate::models::{
    Campaign, CreateCampaignRequest, CreateDomainRequest, CreateLinkRequest, Domain, Link,
    Template, TrafficParameter, UpdateCampaignRequest, UpdateDomainRequest,
};
use crate::storage::{Storage, StorageError};

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub pagination: PaginationConfig,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<T, ApiError>;

pub fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn not_found(kind: &str, id: &str) -> ApiError {
    error_response(StatusCode::NOT_FOUND, format!("{kind} '{id}' not found"))
}

impl From<StorageError> for ErrorResponse {
    fn from(err: StorageError) -> Self {
        ErrorResponse {
            error: err.to_string(),
        }
    }
}

pub fn storage_error(err: StorageError) -> ApiError {
    let status = match &err {
        StorageError::NotFound(..) => StatusCode::NOT_FOUND,
        StorageError::Conflict => StatusCode::CONFLICT,
        StorageError::Invalid(_) => StatusCode::BAD_REQUEST,
        StorageError::Other(e) => {
            tracing::error!("storage failure: {:#}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };
    tracing::debug!(status = %status, "request rejected: {}", err);
    (status, Json(err.into()))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}

pub async fn list_domains(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Domain>>> {
    state
        .storage
        .list_domains()
        .await
        .map(Json)
        .map_err(storage_error)
}

pub async fn create_domain(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDomainRequest>,
) -> ApiResult<(StatusCode, Json<Domain>)> {
    let domain = state
        .storage
        .create_domain(payload)
        .await
        .map_err(storage_error)?;
    Ok((StatusCode::CREATED, Json(domain)))
}

pub async fn get_domain(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Domain>> {
    match state.storage.get_domain(&id).await {
        Ok(Some(domain)) => Ok(Json(domain)),
        Ok(None) => Err(not_found("domain", &id)),
        Err(e) => Err(storage_error(e)),
    }
}

pub async fn update_domain(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateDomainRequest>,
) -> ApiResult<Json<Domain>> {
    match state.storage.update_domain(&id, payload).await {
        Ok(Some(domain)) => Ok(Json(domain)),
        Ok(None) => Err(not_found("domain", &id)),
        Err(e) => Err(storage_error(e)),
    }
}

pub async fn delete_domain(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    match state.storage.delete_domain(&id).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Domain deleted successfully".to_string(),
        })),
        Ok(false) => Err(not_found("domain", &id)),
        Err(e) => Err(storage_error(e)),
    }
}

pub async fn list_templates(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Template>>> {
    state
        .storage
        .list_templates()
        .await
        .map(Json)
        .map_err(storage_error)
}

pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Campaign>>> {
    state
        .storage
        .list_campaigns()
        .await
        .map(Json)
        .map_err(storage_error)
}

pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCampaignRequest>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    let campaign = state
        .storage
        .create_campaign(payload)
        .await
        .map_err(storage_error)?;
    tracing::info!(campaign_id = %campaign.id, "campaign created");
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Campaign>> {
    match state.storage.get_campaign(&id).await {
        Ok(Some(campaign)) => Ok(Json(campaign)),
        Ok(None) => Err(not_found("campaign", &id)),
        Err(e) => Err(storage_error(e)),
    }
}

pub async fn update_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCampaignRequest>,
) -> ApiResult<Json<Campaign>> {
    match state.storage.update_campaign(&id, payload).await {
        Ok(Some(campaign)) => Ok(Json(campaign)),
        Ok(None) => Err(not_found("campaign", &id)),
        Err(e) => Err(storage_error(e)),
    }
}

pub async fn update_traffic_parameters(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(parameters): Json<Vec<TrafficParameter>>,
) -> ApiResult<Json<SuccessResponse>> {
    match state.storage.update_traffic_parameters(&id, parameters).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Traffic parameters updated".to_string(),
        })),
        Ok(false) => Err(not_found("campaign", &id)),
        Err(e) => Err(storage_error(e)),
    }
}

pub async fn list_campaign_links(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Link>>> {
    if state
        .storage
        .get_campaign(&id)
        .await
        .map_err(storage_error)?
        .is_none()
    {
        return Err(not_found("campaign", &id));
    }

    state
        .storage
        .list_links(Some(&id))
        .await
        .map(Json)
        .map_err(storage_error)
}

pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<CreateLinkRequest>,
) -> ApiResult<(StatusCode, Json<Link>)> {
    let link = state
        .storage
        .create_link(&id, payload)
        .await
        .map_err(storage_error)?;
    tracing::info!(link_id = %link.id, slug = %link.slug, "link created");
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Link>> {
    match state.storage.get_link(&id).await {
        Ok(Some(link)) => Ok(Json(link)),
        Ok(None) => Err(not_found("link", &id)),
        Err(e) => Err(storage_error(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_status_mapping() {
        let (status, body) = storage_error(StorageError::NotFound("link", "l9".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "link 'l9' not found");

        let (status, _) = storage_error(StorageError::Conflict);
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = storage_error(StorageError::Invalid("bad slug".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_backend_failure_is_not_leaked() {
        let err = StorageError::from(anyhow::anyhow!("disk quota exceeded on /var/lib"));
        let (status, body) = storage_error(err);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
    }
}
