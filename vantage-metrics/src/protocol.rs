use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of a metric, determining its update semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// The latest observed value wins (overwrite semantics).
    Gauge,
    /// A running integer total (accumulate semantics).
    Counter,
}

impl MetricKind {
    /// Returns the string representation used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error returned when parsing an unknown metric kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric kind")]
pub struct ParseMetricKindError;

impl FromStr for MetricKind {
    type Err = ParseMetricKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(Self::Gauge),
            "counter" => Ok(Self::Counter),
            _ => Err(ParseMetricKindError),
        }
    }
}

/// The payload of a metric. Exactly one variant exists per metric, so a
/// value can never carry both a gauge and a counter payload.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum MetricValue {
    /// The latest observed value.
    Gauge(f64),
    /// The running total, or the delta to apply to it.
    Counter(i64),
}

impl MetricValue {
    /// Returns the kind matching this payload.
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Counter(_) => MetricKind::Counter,
        }
    }
}

/// A single named measurement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// The metric name, unique within its kind.
    pub name: String,
    /// The typed payload.
    #[serde(flatten)]
    pub value: MetricValue,
}

impl Metric {
    /// Creates a gauge metric.
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: MetricValue::Gauge(value),
        }
    }

    /// Creates a counter metric.
    pub fn counter(name: impl Into<String>, delta: i64) -> Self {
        Self {
            name: name.into(),
            value: MetricValue::Counter(delta),
        }
    }

    /// Returns the kind of this metric.
    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }
}

/// Why a [`MetricUpdate`] failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidUpdate {
    /// The identifier is empty after trimming.
    #[error("metric identifier is empty")]
    EmptyId,
    /// The update does not carry the payload its kind requires.
    #[error("{kind} update is missing its payload")]
    MissingPayload {
        /// The declared kind of the rejected update.
        kind: MetricKind,
    },
}

/// An unvalidated metric update as handed in by transport adapters.
///
/// Unlike [`Metric`], both payload fields are optional here; validation via
/// [`MetricUpdate::into_metric`] is the single place where incomplete
/// updates are rejected.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricUpdate {
    /// The metric identifier.
    pub id: String,
    /// The declared kind.
    #[serde(rename = "type")]
    pub kind: MetricKind,
    /// Gauge payload, required when `kind` is [`MetricKind::Gauge`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Counter payload, required when `kind` is [`MetricKind::Counter`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
}

impl MetricUpdate {
    /// Creates a gauge update.
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Gauge,
            value: Some(value),
            delta: None,
        }
    }

    /// Creates a counter update.
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Counter,
            value: None,
            delta: Some(delta),
        }
    }

    /// Validates the update and converts it into a typed [`Metric`].
    ///
    /// The identifier is trimmed before the emptiness check. A gauge update
    /// without a value, or a counter update without a delta, is rejected.
    pub fn into_metric(self) -> Result<Metric, InvalidUpdate> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(InvalidUpdate::EmptyId);
        }

        match (self.kind, self.value, self.delta) {
            (MetricKind::Gauge, Some(value), _) => Ok(Metric::gauge(id, value)),
            (MetricKind::Counter, _, Some(delta)) => Ok(Metric::counter(id, delta)),
            (kind, _, _) => Err(InvalidUpdate::MissingPayload { kind }),
        }
    }
}
