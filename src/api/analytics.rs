//! Visit listing and statistics handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::handlers::{error_response, not_found, storage_error, ApiResult, AppState};
use crate::analytics::{aggregate, FilterSpec, StatsSummary};
use crate::cursor::{create_cursor, page_visits, verify_cursor};
use crate::models::VisitEvent;

#[derive(Debug, Deserialize)]
pub struct VisitListParams {
    /// Page size, clamped to the configured maximum
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VisitListResponse {
    pub visits: Vec<VisitEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// List visits of a link, newest first
pub async fn list_link_visits(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<VisitListParams>,
) -> ApiResult<Json<VisitListResponse>> {
    if state
        .storage
        .get_link(&id)
        .await
        .map_err(storage_error)?
        .is_none()
    {
        return Err(not_found("link", &id));
    }

    let cursor = match params.cursor.as_deref() {
        Some(raw) => Some(verify_cursor(raw).map_err(|e| {
            tracing::warn!(link_id = %id, "rejected visit cursor: {}", e);
            error_response(StatusCode::BAD_REQUEST, "Invalid cursor")
        })?),
        None => None,
    };

    let limit = state.pagination.clamp(params.limit);
    let visits = state
        .storage
        .get_visits(Some(&id))
        .await
        .map_err(storage_error)?;
    let (visits, next) = page_visits(visits, cursor.as_ref(), limit);

    let next_cursor = match next {
        Some(data) => Some(create_cursor(&data).map_err(|e| {
            tracing::error!("Failed to create visit cursor: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to paginate visits")
        })?),
        None => None,
    };

    Ok(Json(VisitListResponse {
        visits,
        next_cursor,
    }))
}

/// Statistics for one link under the given filters
pub async fn link_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(spec): Json<FilterSpec>,
) -> ApiResult<Json<StatsSummary>> {
    if state
        .storage
        .get_link(&id)
        .await
        .map_err(storage_error)?
        .is_none()
    {
        return Err(not_found("link", &id));
    }

    let visits = state
        .storage
        .get_visits(Some(&id))
        .await
        .map_err(storage_error)?;
    let summary = aggregate(&visits, &spec);

    tracing::debug!(
        link_id = %id,
        scanned = visits.len(),
        matched = summary.total,
        "computed link stats"
    );
    Ok(Json(summary))
}

/// Statistics across every link of a campaign
pub async fn campaign_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(spec): Json<FilterSpec>,
) -> ApiResult<Json<StatsSummary>> {
    if state
        .storage
        .get_campaign(&id)
        .await
        .map_err(storage_error)?
        .is_none()
    {
        return Err(not_found("campaign", &id));
    }

    let links = state
        .storage
        .list_links(Some(&id))
        .await
        .map_err(storage_error)?;

    let mut visits = Vec::new();
    for link in &links {
        visits.extend(
            state
                .storage
                .get_visits(Some(&link.id))
                .await
                .map_err(storage_error)?,
        );
    }
    let summary = aggregate(&visits, &spec);

    tracing::debug!(
        campaign_id = %id,
        links = links.len(),
        scanned = visits.len(),
        matched = summary.total,
        "computed campaign stats"
    );
    Ok(Json(summary))
}
