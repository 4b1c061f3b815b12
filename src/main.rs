use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livepoll::{
    advance, api,
    clock::SystemClock,
    config::ServerConfig,
    state::AppState,
    store::{MemoryStore, PollStore, SqliteStore},
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livepoll=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting livepoll...");

    let config = ServerConfig::from_env();

    let store: Arc<dyn PollStore> = match SqliteStore::open(&config.database_path).await {
        Ok(store) => {
            tracing::info!("Using SQLite store at {}", config.database_path);
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to open database {}: {}. Polls will not survive a restart.",
                config.database_path,
                e
            );
            Arc::new(MemoryStore::new())
        }
    };

    let state = Arc::new(AppState::with_store(
        store,
        Arc::new(SystemClock),
        config.session.clone(),
    ));

    match state.polls.load_active_poll().await {
        Ok(Some(poll)) => tracing::info!("Restored active poll {}: {}", poll.id, poll.question),
        Ok(None) => tracing::info!("No active poll to restore"),
        Err(e) => tracing::error!("Failed to restore active poll: {}", e),
    }

    // Spawn background task that launches the next queued poll when the active one is done
    advance::spawn_auto_advancer(state.clone());

    let app = api::router(state);

    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
