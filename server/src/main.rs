use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;

use agora_ticketing::config::{Config, StoreBackend};
use agora_ticketing::logging::init_tracing;
use agora_ticketing::routes::create_routes;
use agora_ticketing::state::AppState;
use agora_ticketing::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let config = Config::from_env()?;
    init_tracing(&config)?;

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Postgres => {
            let store = PgStore::connect(&config.database_url, config.max_connections).await?;
            tracing::info!("Successfully connected to database");

            store.migrate().await?;
            tracing::info!("Migrations run successfully");
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let app = create_routes(AppState::new(store), &config);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("🚀 Server running at http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
