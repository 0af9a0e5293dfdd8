use anyhow::Result;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trackly::api::create_api_router;
use trackly::config::Config;
use trackly::cursor::init_cursor_hmac_key;
use trackly::redirect::create_redirect_router;
use trackly::storage::{load_demo_data, MemoryStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    init_cursor_hmac_key(config.pagination.cursor_hmac_secret.as_deref());

    // Initialize storage
    let memory = MemoryStorage::new();
    if config.seed_demo_data {
        load_demo_data(&memory, chrono::Utc::now().timestamp_millis()).await?;
    } else {
        info!("Starting with an empty store");
    }
    let storage: Arc<dyn Storage> = Arc::new(memory);

    // Create routers
    let api_router = create_api_router(Arc::clone(&storage), &config);
    let redirect_router = create_redirect_router(Arc::clone(&storage));

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);
    info!("   - Stats endpoint: POST http://{}/api/links/{{id}}/stats", api_addr);

    // Start redirect server
    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!("🚀 Redirect server listening on http://{}", redirect_addr);

    // Run both servers concurrently
    tokio::try_join!(
        axum::serve(api_listener, api_router).into_future(),
        axum::serve(
            redirect_listener,
            redirect_router.into_make_service_with_connect_info::<SocketAddr>()
        )
        .into_future(),
    )?;

    Ok(())
}
