//! Talking Stick Server - Main Entry Point

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use stick_server::{
    api,
    commands::CommandHandlers,
    config::{self, KvBackend},
    db,
    gate::{MessageGate, PhraseFilter},
    permissions::{Directory, MemoryDirectory, PermissionResolver, RedisDirectory},
    settle::SettleController,
    stick::{ChannelStateStore, KvStore, MemoryKv, RedisKv},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stick_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Talking Stick Server"
    );

    // Channel state and identity directory
    let (kv, directory) = match config.kv_backend {
        KvBackend::Redis => {
            let redis = db::create_redis_client(&config.redis_url).await?;
            let kv: Arc<dyn KvStore> =
                Arc::new(RedisKv::new(redis.clone(), config.kv_namespace.clone()));
            let directory: Arc<dyn Directory> = Arc::new(RedisDirectory::new(redis));
            (kv, directory)
        }
        KvBackend::Memory => {
            tracing::warn!("Using in-memory state; nothing survives a restart");
            let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
            let memory = match &config.memory_directory_file {
                Some(path) => {
                    let memory = MemoryDirectory::from_file(Path::new(path))?;
                    info!(path = %path, users = memory.user_count(), "Memory directory seeded");
                    memory
                }
                None => {
                    tracing::warn!(
                        "MEMORY_DIRECTORY_FILE not set; the memory directory has no identities, \
                         so no user resolves and nobody can settle"
                    );
                    MemoryDirectory::new()
                }
            };
            let directory: Arc<dyn Directory> = Arc::new(memory);
            (kv, directory)
        }
    };

    let store = ChannelStateStore::new(kv);
    let resolver = PermissionResolver::new(Arc::clone(&directory), config.bypass);
    let settle = SettleController::new(store.clone());

    let filter = PhraseFilter::new(&config.suppression_phrases);
    if !filter.is_empty() {
        info!(
            phrases = config.suppression_phrases.len(),
            "Suppression phrases loaded"
        );
    }

    let gate = MessageGate::new(
        store.clone(),
        resolver.clone(),
        Arc::clone(&directory),
        filter,
        config.fault_policy,
    );
    let commands = CommandHandlers::new(store, settle, resolver, directory);

    // Build router
    let state = api::AppState::new(gate, commands, config.clone());
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");

    Ok(())
}
