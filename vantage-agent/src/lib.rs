//! Collection agent for Vantage.
//!
//! The agent side of the pipeline: a [`Sampler`] writes host and process
//! statistics into a shared [`MetricStore`](vantage_metrics::MetricStore), a
//! [`Reporter`] periodically snapshots the store and assembles batches, and
//! a [`BatchPublisher`] delivers those batches through a bounded pool of
//! concurrent senders. The actual wire transport stays behind the
//! [`Publisher`] trait.

mod agent;
mod publish;
mod report;
mod sampler;

pub use agent::Agent;
pub use publish::{BatchPublisher, BatchSubmitter, PublishError, Publisher};
pub use report::Reporter;
pub use sampler::Sampler;
