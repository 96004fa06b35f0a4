//! Storage backends for aggregated metric state.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vantage_config::ServerConfig;
use vantage_metrics::{Metric, Snapshot};

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// Errors produced by repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No stored value exists under the requested name.
    #[error("metric not found")]
    NotFound,

    /// The operation requires a database, but none is configured.
    #[error("no database attached")]
    NoDatabase,

    /// The underlying database failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Shutdown fired while the operation was running or waiting to retry.
    #[error("operation cancelled")]
    Cancelled,
}

/// Authoritative storage for gauge and counter values.
///
/// Callers hold the trait object and never depend on a concrete backend.
/// `set_gauge` is a pure overwrite and `add_counter` is applied as a single
/// atomic upsert, so both are safe to repeat after a transient failure.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Returns the current value of the gauge `name`.
    async fn gauge(&self, name: &str) -> Result<f64, StoreError>;

    /// Returns the current total of the counter `name`.
    async fn counter(&self, name: &str) -> Result<i64, StoreError>;

    /// Overwrites the gauge `name` with `value`.
    async fn set_gauge(&self, name: &str, value: f64) -> Result<(), StoreError>;

    /// Adds `delta` to the counter `name`, starting from zero if absent.
    async fn add_counter(&self, name: &str, delta: i64) -> Result<(), StoreError>;

    /// Applies a batch of metrics.
    ///
    /// Backed by a relational store, the batch is one all-or-nothing
    /// transaction: any failure rolls back every item.
    async fn update_many(&self, metrics: &[Metric]) -> Result<(), StoreError>;

    /// Reads the full current state.
    async fn snapshot(&self) -> Result<Snapshot, StoreError>;

    /// Probes liveness of the backing store.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Opens the repository selected by the configuration.
///
/// A configured DSN selects the Postgres repository with the configured
/// retry schedule; otherwise the in-memory repository is used. The token
/// aborts in-flight retries on shutdown.
pub async fn open(
    config: &ServerConfig,
    token: CancellationToken,
) -> Result<Arc<dyn Repository>, StoreError> {
    match &config.storage.database_dsn {
        Some(dsn) => {
            let repository =
                PostgresRepository::connect(dsn, config.retry.schedule(), token).await?;
            Ok(Arc::new(repository))
        }
        None => Ok(Arc::new(MemoryRepository::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_without_a_dsn_selects_the_memory_repository() {
        let config = ServerConfig::default();
        let repository = open(&config, CancellationToken::new()).await.unwrap();

        assert!(matches!(repository.ping().await, Err(StoreError::NoDatabase)));
        repository.set_gauge("g", 1.0).await.unwrap();
        assert_eq!(repository.gauge("g").await.unwrap(), 1.0);
    }
}
