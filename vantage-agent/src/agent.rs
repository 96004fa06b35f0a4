use std::sync::Arc;

use vantage_config::AgentConfig;
use vantage_metrics::MetricStore;

use crate::publish::{BatchPublisher, Publisher};
use crate::report::Reporter;
use crate::sampler::Sampler;

/// Assembles the full agent pipeline from configuration.
///
/// Sampler and reporter share one store; the reporter feeds the delivery
/// pool. All three are stopped together in pipeline order so queued batches
/// drain before the process exits.
pub struct Agent {
    sampler: Sampler,
    reporter: Reporter,
    pool: BatchPublisher,
}

impl Agent {
    /// Starts sampling, reporting, and the delivery pool.
    pub fn start(
        config: &AgentConfig,
        store: Arc<MetricStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let pool = BatchPublisher::start(publisher, config.rate_limit);
        let sampler = Sampler::start(Arc::clone(&store), config.poll_interval());
        let reporter = Reporter::start(store, pool.submitter(), config.report_interval());

        Self {
            sampler,
            reporter,
            pool,
        }
    }

    /// Stops all loops and waits for in-flight deliveries to finish.
    pub async fn shutdown(self) {
        self.sampler.shutdown().await;
        self.reporter.shutdown().await;
        self.pool.stop().await;
        vantage_log::info!("agent stopped");
    }
}
