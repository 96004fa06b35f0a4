use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::Metric;

/// Concurrent in-memory store for gauge and counter values.
///
/// Readers proceed concurrently with each other; writers are exclusive. Both
/// maps live behind a single lock, so one [`snapshot`](Self::snapshot) call
/// observes a state consistent with respect to any single writer call. No
/// atomicity is guaranteed across multiple writer calls.
#[derive(Debug, Default)]
pub struct MetricStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    gauges: BTreeMap<String, f64>,
    counters: BTreeMap<String, i64>,
}

impl MetricStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the gauge `name` with `value`.
    pub fn set_gauge(&self, name: &str, value: f64) {
        self.inner.write().gauges.insert(name.to_owned(), value);
    }

    /// Adds `delta` to the counter `name`. An absent counter starts at zero.
    pub fn add_counter(&self, name: &str, delta: i64) {
        *self
            .inner
            .write()
            .counters
            .entry(name.to_owned())
            .or_default() += delta;
    }

    /// Returns the current value of the gauge `name`.
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.inner.read().gauges.get(name).copied()
    }

    /// Returns the current total of the counter `name`.
    pub fn counter(&self, name: &str) -> Option<i64> {
        self.inner.read().counters.get(name).copied()
    }

    /// Exports an independently owned copy of both maps, taken under a
    /// single read guard. Mutating the returned snapshot never affects the
    /// live store.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read();
        Snapshot {
            gauges: inner.gauges.clone(),
            counters: inner.counters.clone(),
        }
    }
}

/// A point-in-time copy of all gauge and counter values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Gauge values by name.
    pub gauges: BTreeMap<String, f64>,
    /// Counter totals by name.
    pub counters: BTreeMap<String, i64>,
}

impl Snapshot {
    /// Returns `true` if the snapshot holds no values at all.
    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty() && self.counters.is_empty()
    }

    /// Returns the number of values across both namespaces.
    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len()
    }

    /// Flattens the snapshot into one ordered list of metrics: gauges
    /// first, then counters, each sorted by name.
    pub fn metrics(&self) -> Vec<Metric> {
        let mut metrics = Vec::with_capacity(self.len());
        metrics.extend(
            self.gauges
                .iter()
                .map(|(name, value)| Metric::gauge(name.clone(), *value)),
        );
        metrics.extend(
            self.counters
                .iter()
                .map(|(name, total)| Metric::counter(name.clone(), *total)),
        );
        metrics
    }
}
