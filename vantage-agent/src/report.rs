use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use vantage_metrics::MetricStore;

use crate::publish::BatchSubmitter;

/// Periodic reporting loop.
///
/// Every interval, the reporter snapshots the store, flattens it into one
/// batch, and submits it for delivery. An empty store produces no batch.
pub struct Reporter {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Reporter {
    /// Starts the reporting loop with the given interval.
    pub fn start(store: Arc<MetricStore>, submitter: BatchSubmitter, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let loop_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let snapshot = store.snapshot();
                        if snapshot.is_empty() {
                            continue;
                        }
                        let batch = snapshot.metrics();
                        vantage_log::debug!("reporting batch of {}", batch.len());
                        submitter.submit(batch).await;
                    }
                }
            }
            // Dropping the submitter here releases our hold on the queue.
        });

        Self { token, handle }
    }

    /// Signals the loop to exit before its next tick. Idempotent.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use similar_asserts::assert_eq;
    use vantage_metrics::Metric;

    use super::*;
    use crate::publish::{BatchPublisher, PublishError, Publisher};

    #[derive(Default)]
    struct CountingPublisher {
        batches: AtomicUsize,
        items: AtomicUsize,
    }

    #[async_trait]
    impl Publisher for CountingPublisher {
        async fn send_batch(&self, batch: &[Metric]) -> Result<(), PublishError> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            self.items.fetch_add(batch.len(), Ordering::SeqCst);
            Ok(())
        }

        async fn send_one(&self, _metric: &Metric) -> Result<(), PublishError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reporter_submits_snapshots_on_its_interval() {
        let store = Arc::new(MetricStore::new());
        store.set_gauge("g", 1.0);
        store.add_counter("c", 2);

        let publisher = Arc::new(CountingPublisher::default());
        let pool = BatchPublisher::start(Arc::clone(&publisher) as Arc<dyn Publisher>, 1);
        let reporter = Reporter::start(Arc::clone(&store), pool.submitter(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(25)).await;
        reporter.shutdown().await;
        pool.stop().await;

        // Ticks at 0s, 10s and 20s, two metrics each.
        assert_eq!(publisher.batches.load(Ordering::SeqCst), 3);
        assert_eq!(publisher.items.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_stores_produce_no_batches() {
        let store = Arc::new(MetricStore::new());
        let publisher = Arc::new(CountingPublisher::default());
        let pool = BatchPublisher::start(Arc::clone(&publisher) as Arc<dyn Publisher>, 1);
        let reporter = Reporter::start(Arc::clone(&store), pool.submitter(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(35)).await;
        reporter.shutdown().await;
        pool.stop().await;

        assert_eq!(publisher.batches.load(Ordering::SeqCst), 0);
    }
}
