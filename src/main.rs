use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stride_leads::auth::AuthClient;
use stride_leads::config::Config;
use stride_leads::db::Database;
use stride_leads::handlers::AppState;
use stride_leads::lead_store::{LeadStore, MemoryLeadStore, PgLeadStore};
use stride_leads::routes::build_router;

/// Main entry point for the application.
///
/// Initializes logging, configuration, the lead store and the auth client,
/// then serves the router until the process is stopped.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stride_leads=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let store: Arc<dyn LeadStore> = if config.uses_memory_store() {
        tracing::warn!("Using in-memory lead store; leads are lost on restart");
        Arc::new(MemoryLeadStore::new())
    } else {
        let db = Database::new(&config.database_url).await?;
        tracing::info!("Database connection pool established");
        Arc::new(PgLeadStore::new(db.pool))
    };

    let auth = AuthClient::new(config.auth_url.clone(), config.auth_api_key.clone())?;
    tracing::info!("Auth client initialized: {}", config.auth_url);

    let port = config.port;
    let app_state = Arc::new(AppState::new(config, store, auth));
    let app = build_router(app_state)?;

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Peer addresses let the rate limiter key clients not behind a proxy
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
