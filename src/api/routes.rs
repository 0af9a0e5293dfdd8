use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::storage::Storage;

use super::analytics::{campaign_stats, link_stats, list_link_visits};
use super::handlers::{
    create_campaign, create_domain, create_link, delete_domain, get_campaign, get_domain,
    get_link, health_check, list_campaign_links, list_campaigns, list_domains, list_templates,
    update_campaign, update_domain, update_traffic_parameters, AppState,
};

fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match allowed_origin.and_then(|origin| HeaderValue::from_str(origin).ok()) {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(Any),
    }
}

pub fn create_api_router(storage: Arc<dyn Storage>, config: &Config) -> Router {
    let state = Arc::new(AppState {
        storage,
        pagination: config.pagination.clone(),
    });

    let api_routes = Router::new()
        .route("/domains", get(list_domains).post(create_domain))
        .route(
            "/domains/{id}",
            get(get_domain).put(update_domain).delete(delete_domain),
        )
        .route("/templates", get(list_templates))
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route("/campaigns/{id}", get(get_campaign).put(update_campaign))
        .route("/campaigns/{id}/parameters", put(update_traffic_parameters))
        .route(
            "/campaigns/{id}/links",
            get(list_campaign_links).post(create_link),
        )
        .route("/campaigns/{id}/stats", post(campaign_stats))
        .route("/links/{id}", get(get_link))
        .route("/links/{id}/visits", get(list_link_visits))
        .route("/links/{id}/stats", post(link_stats))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(cors_layer(config.cors_allowed_origin.as_deref()))
}
