use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio_util::sync::CancellationToken;
use vantage_common::retry::{RetryError, retry};
use vantage_metrics::{Metric, MetricValue, Snapshot};

use super::{Repository, StoreError};

/// Rows live until explicitly overwritten; both tables are plain upsert
/// targets keyed by metric name.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS gauges (
    name  TEXT PRIMARY KEY,
    value DOUBLE PRECISION NOT NULL
);
CREATE TABLE IF NOT EXISTS counters (
    name  TEXT PRIMARY KEY,
    value BIGINT NOT NULL
);
";

const UPSERT_GAUGE: &str = "
INSERT INTO gauges (name, value) VALUES ($1, $2)
ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value
";

/// The addition happens inside the statement, so repeating a failed call
/// never applies the delta twice through read-modify-write races.
const UPSERT_COUNTER: &str = "
INSERT INTO counters (name, value) VALUES ($1, $2)
ON CONFLICT (name) DO UPDATE SET value = counters.value + EXCLUDED.value
";

/// Repository backed by Postgres.
///
/// Every operation runs through the shared retry schedule; only
/// connection-class failures are retried, constraint violations and other
/// logical errors surface on the first attempt.
pub struct PostgresRepository {
    pool: PgPool,
    backoff: Vec<Duration>,
    token: CancellationToken,
}

impl PostgresRepository {
    /// Connects to `dsn` and bootstraps the schema.
    ///
    /// The pool itself connects lazily; the schema bootstrap is the first
    /// statement to hit the network and is retried like any other
    /// operation.
    pub async fn connect(
        dsn: &str,
        backoff: Vec<Duration>,
        token: CancellationToken,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(8).connect_lazy(dsn)?;
        let repository = Self {
            pool,
            backoff,
            token,
        };

        repository
            .with_retry(|| async {
                sqlx::raw_sql(SCHEMA).execute(&repository.pool).await?;
                Ok(())
            })
            .await?;

        Ok(repository)
    }

    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        retry(&self.token, &self.backoff, is_transient, op)
            .await
            .map_err(|error| match error {
                RetryError::Cancelled => StoreError::Cancelled,
                RetryError::Op(error) => StoreError::Database(error),
            })
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn gauge(&self, name: &str) -> Result<f64, StoreError> {
        let value = self
            .with_retry(|| async {
                sqlx::query_scalar::<_, f64>("SELECT value FROM gauges WHERE name = $1")
                    .bind(name)
                    .fetch_optional(&self.pool)
                    .await
            })
            .await?;
        value.ok_or(StoreError::NotFound)
    }

    async fn counter(&self, name: &str) -> Result<i64, StoreError> {
        let value = self
            .with_retry(|| async {
                sqlx::query_scalar::<_, i64>("SELECT value FROM counters WHERE name = $1")
                    .bind(name)
                    .fetch_optional(&self.pool)
                    .await
            })
            .await?;
        value.ok_or(StoreError::NotFound)
    }

    async fn set_gauge(&self, name: &str, value: f64) -> Result<(), StoreError> {
        self.with_retry(|| async {
            sqlx::query(UPSERT_GAUGE)
                .bind(name)
                .bind(value)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    async fn add_counter(&self, name: &str, delta: i64) -> Result<(), StoreError> {
        self.with_retry(|| async {
            sqlx::query(UPSERT_COUNTER)
                .bind(name)
                .bind(delta)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    async fn update_many(&self, metrics: &[Metric]) -> Result<(), StoreError> {
        // A retryable failure re-runs the whole closure, so the transaction
        // restarts from `begin` rather than resuming half-applied.
        self.with_retry(|| async {
            let mut tx = self.pool.begin().await?;
            for metric in metrics {
                match metric.value {
                    MetricValue::Gauge(value) => {
                        sqlx::query(UPSERT_GAUGE)
                            .bind(&metric.name)
                            .bind(value)
                            .execute(&mut *tx)
                            .await?;
                    }
                    MetricValue::Counter(delta) => {
                        sqlx::query(UPSERT_COUNTER)
                            .bind(&metric.name)
                            .bind(delta)
                            .execute(&mut *tx)
                            .await?;
                    }
                }
            }
            tx.commit().await
        })
        .await
    }

    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        self.with_retry(|| async {
            let mut snapshot = Snapshot::default();

            for row in sqlx::query("SELECT name, value FROM gauges")
                .fetch_all(&self.pool)
                .await?
            {
                match (row.try_get::<String, _>(0), row.try_get::<f64, _>(1)) {
                    (Ok(name), Ok(value)) => {
                        snapshot.gauges.insert(name, value);
                    }
                    _ => vantage_log::debug!("skipping undecodable gauge row"),
                }
            }

            for row in sqlx::query("SELECT name, value FROM counters")
                .fetch_all(&self.pool)
                .await?
            {
                match (row.try_get::<String, _>(0), row.try_get::<i64, _>(1)) {
                    (Ok(name), Ok(total)) => {
                        snapshot.counters.insert(name, total);
                    }
                    _ => vantage_log::debug!("skipping undecodable counter row"),
                }
            }

            Ok(snapshot)
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_retry(|| async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
        .await
    }
}

/// Connection-class failures eligible for retry.
///
/// Logical errors, including constraint violations, are permanent and must
/// surface on the first attempt.
fn is_transient(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        // SQLSTATE class 08: connection exceptions.
        sqlx::Error::Database(db) => db.code().is_some_and(|code| code.starts_with("08")),
        _ => false,
    }
}
