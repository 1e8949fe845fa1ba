use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_insights_api::auth::TokenVerifier;
use rust_insights_api::cache::FileCache;
use rust_insights_api::config::Config;
use rust_insights_api::handlers::AppState;
use rust_insights_api::router::build_router;
use rust_insights_api::services::SyntageService;

/// Main entry point for the application.
///
/// Initializes logging, configuration, the durable response cache, the
/// upstream Syntage client, and the token verifier, then starts the Axum
/// server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_insights_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Reload the durable response cache, dropping expired entries
    let cache = FileCache::load(
        config.cache_file.clone(),
        Duration::from_secs(config.cache_ttl_secs),
    )
    .await;

    let syntage = SyntageService::new(&config);
    let verifier = TokenVerifier::new(config.firebase_project_id.clone());

    // Build application state
    let app_state = Arc::new(AppState {
        config: config.clone(),
        cache,
        syntage,
        verifier,
    });

    let app = build_router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
