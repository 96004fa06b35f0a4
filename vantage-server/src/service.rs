//! Domain service in front of a [`Repository`].
//!
//! The service is the single place where incoming updates are validated.
//! After a successful bulk update it takes a fresh snapshot and hands it to
//! an optional change hook, which deployments use to persist synchronously
//! or to trigger reporting.

use std::sync::Arc;

use vantage_metrics::{InvalidUpdate, Metric, MetricKind, MetricUpdate, MetricValue, Snapshot};

use crate::audit::{AuditEvent, AuditSubject};
use crate::store::{Repository, StoreError};

/// Hook invoked with a fresh snapshot after every successful bulk update.
pub type ChangeHook = Box<dyn Fn(&Snapshot) + Send + Sync>;

/// Errors returned to the service's callers.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The metric does not exist, or the identifier is empty.
    #[error("metric not found")]
    NotFound,

    /// The update does not carry the payload its declared kind requires.
    #[error("invalid metric payload")]
    InvalidPayload,

    /// The underlying repository failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<InvalidUpdate> for ServiceError {
    fn from(error: InvalidUpdate) -> Self {
        match error {
            InvalidUpdate::EmptyId => Self::NotFound,
            InvalidUpdate::MissingPayload { .. } => Self::InvalidPayload,
        }
    }
}

/// Validating facade over a [`Repository`].
pub struct MetricsService {
    repository: Arc<dyn Repository>,
    audit: Arc<AuditSubject>,
    on_change: Option<ChangeHook>,
}

impl MetricsService {
    /// Creates a service over the given repository, with no change hook and
    /// an empty audit subject.
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self {
            repository,
            audit: Arc::new(AuditSubject::new()),
            on_change: None,
        }
    }

    /// Registers the hook invoked with a fresh snapshot after every
    /// successful bulk update.
    pub fn with_change_hook(mut self, hook: impl Fn(&Snapshot) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Box::new(hook));
        self
    }

    /// Replaces the audit subject, e.g. with one shared across services.
    pub fn with_audit(mut self, audit: Arc<AuditSubject>) -> Self {
        self.audit = audit;
        self
    }

    /// The audit subject events are published to.
    pub fn audit(&self) -> &AuditSubject {
        &self.audit
    }

    /// Validates and applies a single update, returning the now-current
    /// value of the metric.
    pub async fn upsert(&self, update: MetricUpdate) -> Result<Metric, ServiceError> {
        let metric = update.into_metric()?;

        match metric.value {
            MetricValue::Gauge(value) => self.repository.set_gauge(&metric.name, value).await?,
            MetricValue::Counter(delta) => self.repository.add_counter(&metric.name, delta).await?,
        }

        let current = self.read_current(metric.kind(), &metric.name).await?;
        self.audit.publish(&AuditEvent::MetricUpserted {
            metric: current.clone(),
        });
        Ok(current)
    }

    /// Validates and applies a batch of updates, returning how many items
    /// passed validation and were written.
    ///
    /// Invalid items are dropped; only all-invalid input fails the call.
    /// The change notification after a successful write is best-effort: a
    /// snapshot failure there is logged and swallowed.
    pub async fn upsert_batch(&self, updates: Vec<MetricUpdate>) -> Result<usize, ServiceError> {
        let metrics: Vec<Metric> = updates
            .into_iter()
            .filter_map(|update| match update.into_metric() {
                Ok(metric) => Some(metric),
                Err(reason) => {
                    vantage_log::debug!("dropping invalid update: {reason}");
                    None
                }
            })
            .collect();

        if metrics.is_empty() {
            return Err(ServiceError::InvalidPayload);
        }

        self.repository.update_many(&metrics).await?;
        let applied = metrics.len();

        if let Some(hook) = &self.on_change {
            match self.repository.snapshot().await {
                Ok(snapshot) => hook(&snapshot),
                Err(error) => {
                    vantage_log::debug!("change notification skipped: {error}");
                }
            }
        }

        self.audit.publish(&AuditEvent::BatchApplied { applied });
        Ok(applied)
    }

    /// Returns the current value of the metric `id` of the given kind.
    ///
    /// The identifier is trimmed; an empty identifier is [`ServiceError::NotFound`].
    pub async fn get(&self, kind: MetricKind, id: &str) -> Result<Metric, ServiceError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ServiceError::NotFound);
        }
        self.read_current(kind, id).await
    }

    async fn read_current(&self, kind: MetricKind, name: &str) -> Result<Metric, ServiceError> {
        let current = match kind {
            MetricKind::Gauge => self.repository.gauge(name).await.map(MetricValue::Gauge),
            MetricKind::Counter => self.repository.counter(name).await.map(MetricValue::Counter),
        };
        match current {
            Ok(value) => Ok(Metric {
                name: name.to_owned(),
                value,
            }),
            Err(StoreError::NotFound) => Err(ServiceError::NotFound),
            Err(error) => Err(error.into()),
        }
    }
}
