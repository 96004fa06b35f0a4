//! Metric model and in-memory metric state for Vantage.
//!
//! Two families of named numeric values exist side by side:
//!
//! - **Gauges** hold the latest observed floating point value. Writing a
//!   gauge overwrites whatever was stored before.
//! - **Counters** hold a running integer total. Writing a counter adds the
//!   delta to the stored total, starting from zero.
//!
//! The two namespaces are independent: a name may exist as both a gauge and
//! a counter without conflict.
//!
//! [`MetricStore`] is the concurrent store used by the collection agent,
//! [`Snapshot`] is its point-in-time export, and [`Metric`] /
//! [`MetricUpdate`] are the typed and boundary representations of a single
//! measurement.

mod protocol;
mod store;

pub use protocol::{InvalidUpdate, Metric, MetricKind, MetricUpdate, MetricValue};
pub use store::{MetricStore, Snapshot};
