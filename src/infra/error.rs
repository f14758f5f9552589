use thiserror::Error;

use crate::cache::CacheError;

/// Failures while acquiring or driving the process's external resources.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("database url is not configured")]
    MissingDatabaseUrl,
    #[error("database unavailable: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("user cache unavailable: {0}")]
    Cache(#[from] CacheError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
    #[error("failed to install tracing subscriber: {0}")]
    Telemetry(#[from] tracing_subscriber::util::TryInitError),
}
