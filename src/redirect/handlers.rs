use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::models::{Campaign, Link, NewVisit};
use crate::storage::Storage;

const VISIT_ID_HEADER: HeaderName = HeaderName::from_static("x-trackly-visit-id");
const DEVICE_ID_HEADER: &str = "x-device-id";
const VPN_PARAMS: [&str; 2] = ["vpn", "is_vpn"];

pub struct RedirectState {
    pub storage: Arc<dyn Storage>,
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Build the visit for one hit. Link-level params apply first so the query
/// string can override them.
fn build_visit(
    link: &Link,
    query: BTreeMap<String, String>,
    headers: &HeaderMap,
    addr: SocketAddr,
) -> NewVisit {
    let mut visit = NewVisit::new(&link.id);

    for (name, value) in link.params.iter().map(|(k, v)| (k.clone(), v.clone())).chain(query) {
        if VPN_PARAMS.contains(&name.as_str()) {
            visit.is_vpn = parse_flag(&value);
        } else {
            visit.insert_param(&name, value);
        }
    }

    if visit.dimensions.referrer.is_none() {
        visit.dimensions.referrer = headers
            .get(header::REFERER)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
    }
    if visit.dimensions.device_id.is_none() {
        visit.dimensions.device_id = headers
            .get(DEVICE_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
    }
    visit.dimensions.ip = Some(addr.ip().to_string());

    visit
}

fn redirect_target(campaign: &Campaign, returning: bool) -> Option<&str> {
    if returning {
        if let Some(url) = campaign.repeat_visitor_url.as_deref() {
            return Some(url);
        }
    }
    campaign.destination_url.as_deref()
}

/// Record a visit on a tracked link and redirect to the campaign destination
pub async fn redirect_link(
    State(state): State<Arc<RedirectState>>,
    Path(slug): Path<String>,
    Query(query): Query<BTreeMap<String, String>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let link = match state.storage.get_link_by_slug(&slug).await {
        Ok(Some(link)) => link,
        Ok(None) => return (StatusCode::NOT_FOUND, "Link not found").into_response(),
        Err(e) => {
            tracing::error!(slug = %slug, "failed to look up link: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    let campaign = match state.storage.get_campaign(&link.campaign_id).await {
        Ok(Some(campaign)) => campaign,
        Ok(None) => return (StatusCode::NOT_FOUND, "Link not found").into_response(),
        Err(e) => {
            tracing::error!(slug = %slug, "failed to look up campaign: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    if !campaign.is_active() {
        return (StatusCode::GONE, "This campaign is not active").into_response();
    }
    if campaign.destination_url.is_none() {
        return (StatusCode::NOT_FOUND, "Campaign has no destination").into_response();
    }

    let mut visit = build_visit(&link, query, &headers, addr);

    let returning = match visit.device_id() {
        Some(device_id) => match state.storage.get_visits(Some(&link.id)).await {
            Ok(previous) => previous.iter().any(|v| v.device_id() == Some(device_id)),
            Err(e) => {
                tracing::warn!(slug = %slug, "failed to load visit history: {}", e);
                false
            }
        },
        None => false,
    };
    visit.dimensions.visitor_type = Some(if returning { "Returning" } else { "New" }.to_string());
    let is_vpn = visit.is_vpn;

    let recorded = match state.storage.record_visit(visit).await {
        Ok(recorded) => recorded,
        Err(e) => {
            tracing::error!(slug = %slug, "failed to record visit: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };
    tracing::debug!(
        slug = %slug,
        visit_id = %recorded.id,
        returning,
        vpn = is_vpn,
        "recorded visit"
    );

    if campaign.block_vpn && is_vpn {
        return (StatusCode::FORBIDDEN, "Access denied").into_response();
    }

    match redirect_target(&campaign, returning) {
        Some(target) => (
            StatusCode::FOUND,
            [
                (header::LOCATION, target.to_string()),
                (VISIT_ID_HEADER, recorded.id),
            ],
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Campaign has no destination").into_response(),
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
