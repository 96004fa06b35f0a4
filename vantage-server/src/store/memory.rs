use async_trait::async_trait;
use vantage_metrics::{Metric, MetricStore, MetricValue, Snapshot};

use super::{Repository, StoreError};

/// Purely in-memory repository backed by a [`MetricStore`].
///
/// State lives for the lifetime of the process. [`Repository::ping`] always
/// fails with [`StoreError::NoDatabase`]: there is no backing store whose
/// liveness could be probed.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    store: MetricStore,
}

impl MemoryRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn gauge(&self, name: &str) -> Result<f64, StoreError> {
        self.store.gauge(name).ok_or(StoreError::NotFound)
    }

    async fn counter(&self, name: &str) -> Result<i64, StoreError> {
        self.store.counter(name).ok_or(StoreError::NotFound)
    }

    async fn set_gauge(&self, name: &str, value: f64) -> Result<(), StoreError> {
        self.store.set_gauge(name, value);
        Ok(())
    }

    async fn add_counter(&self, name: &str, delta: i64) -> Result<(), StoreError> {
        self.store.add_counter(name, delta);
        Ok(())
    }

    async fn update_many(&self, metrics: &[Metric]) -> Result<(), StoreError> {
        for metric in metrics {
            match metric.value {
                MetricValue::Gauge(value) => self.store.set_gauge(&metric.name, value),
                MetricValue::Counter(delta) => self.store.add_counter(&metric.name, delta),
            }
        }
        Ok(())
    }

    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.store.snapshot())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::NoDatabase)
    }
}
