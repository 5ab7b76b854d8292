//! Rig dashboard server binary.

use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rig_dashboard::adapters::cache::{InMemoryStateCache, RedisStateCache};
use rig_dashboard::adapters::http::{app_router, AppServices, RouterSettings};
use rig_dashboard::adapters::storage::{
    FileStateBackend, InMemoryStateBackend, PostgresStateBackend,
};
use rig_dashboard::adapters::websocket::PushHub;
use rig_dashboard::application::StateStore;
use rig_dashboard::config::{
    AppConfig, CacheBackend, ConfigError, StorageBackend, ValidationError,
};
use rig_dashboard::domain::foundation::PersistenceError;
use rig_dashboard::ports::{CacheError, StateBackend, StateCache, SystemClock, UuidIdGenerator};

const PUSH_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("storage unavailable: {0}")]
    Storage(#[from] PersistenceError),

    #[error("cache unavailable: {0}")]
    Cache(#[from] CacheError),

    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("server failed: {0}")]
    Io(#[from] std::io::Error),
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn build_backend(config: &AppConfig) -> Result<Arc<dyn StateBackend>, StartupError> {
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, state is lost on restart");
            Ok(Arc::new(InMemoryStateBackend::new()))
        }
        StorageBackend::File => {
            let path = storage
                .path
                .clone()
                .ok_or(ValidationError::MissingRequired("STORAGE__PATH"))?;
            tracing::info!(path = %path.display(), "Using file storage");
            Ok(Arc::new(FileStateBackend::new(path)))
        }
        StorageBackend::Postgres => {
            let url = storage
                .database_url
                .as_ref()
                .ok_or(ValidationError::MissingRequired("STORAGE__DATABASE_URL"))?;
            let pool = PgPoolOptions::new()
                .max_connections(storage.max_connections)
                .connect(url.expose_secret())
                .await?;
            let backend = PostgresStateBackend::new(pool);
            backend.migrate().await?;
            tracing::info!("Using PostgreSQL storage");
            Ok(Arc::new(backend))
        }
    }
}

async fn build_cache(config: &AppConfig) -> Result<Arc<dyn StateCache>, StartupError> {
    match config.cache.backend {
        CacheBackend::Memory => Ok(Arc::new(InMemoryStateCache::new())),
        CacheBackend::Redis => {
            let mut cache = RedisStateCache::connect(&config.redis.url).await?;
            if let Some(prefix) = &config.redis.key_prefix {
                cache = cache.with_prefix(prefix.clone());
            }
            tracing::info!("Using Redis cache");
            Ok(Arc::new(cache))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let backend = build_backend(&config).await?;
    let cache = build_cache(&config).await?;
    let clock = Arc::new(SystemClock);
    let store = Arc::new(StateStore::new(backend, cache, clock.clone(), config.cache.ttl()));
    let hub = Arc::new(PushHub::new(PUSH_CHANNEL_CAPACITY));
    let services = AppServices::new(store, hub, Arc::new(UuidIdGenerator), clock);

    let settings = RouterSettings {
        request_timeout: config.server.request_timeout(),
        cors_origins: config.server.cors_origins_list(),
    };
    let app = app_router(&services, &settings);

    let addr = config.server.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "Rig dashboard listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
