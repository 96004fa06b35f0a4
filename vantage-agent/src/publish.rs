use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use vantage_metrics::Metric;

/// Error returned by a [`Publisher`] when an item or batch was not
/// delivered.
#[derive(Debug, thiserror::Error)]
#[error("delivery failed: {0}")]
pub struct PublishError(Box<dyn Error + Send + Sync>);

impl PublishError {
    /// Wraps an arbitrary transport error.
    pub fn new(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self(source.into())
    }
}

/// Transport seam for outgoing metric delivery.
///
/// Framing, compression and endpoint addressing are the transport
/// adapter's responsibility; this crate only requires that an `Err` means
/// "not delivered".
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Delivers a whole batch in one transfer.
    async fn send_batch(&self, batch: &[Metric]) -> Result<(), PublishError>;

    /// Delivers a single metric.
    async fn send_one(&self, metric: &Metric) -> Result<(), PublishError>;
}

/// Bounded pool of concurrent senders.
///
/// `limit` workers (minimum 1) drain a shared queue of capacity twice the
/// worker count. At no point do more than `limit` deliveries run at once.
/// Batches may complete out of submission order.
pub struct BatchPublisher {
    tx: flume::Sender<Vec<Metric>>,
    workers: Vec<JoinHandle<()>>,
}

impl BatchPublisher {
    /// Starts the worker pool.
    pub fn start(publisher: Arc<dyn Publisher>, limit: usize) -> Self {
        let worker_count = limit.max(1);
        let (tx, rx) = flume::bounded(worker_count * 2);

        let workers = (0..worker_count)
            .map(|index| {
                let rx = rx.clone();
                let publisher = Arc::clone(&publisher);
                tokio::spawn(run_worker(index, rx, publisher))
            })
            .collect();

        Self { tx, workers }
    }

    /// Enqueues a batch for delivery, waiting while the queue is full.
    ///
    /// The bounded queue is the backpressure mechanism: callers are
    /// throttled rather than batches dropped.
    pub async fn submit(&self, batch: Vec<Metric>) {
        // The workers hold the receiver for as long as this sender exists.
        let _ = self.tx.send_async(batch).await;
    }

    /// Returns a cheap handle for submitting batches from other tasks.
    pub fn submitter(&self) -> BatchSubmitter {
        BatchSubmitter {
            tx: self.tx.clone(),
        }
    }

    /// Closes the queue and waits for queued and in-flight batches to
    /// finish.
    ///
    /// Workers drain the queue before exiting, so no submitted batch is
    /// abandoned. Outstanding [`BatchSubmitter`]s keep the queue open until
    /// they are dropped.
    pub async fn stop(self) {
        drop(self.tx);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Cloneable submission handle for a [`BatchPublisher`].
#[derive(Clone)]
pub struct BatchSubmitter {
    tx: flume::Sender<Vec<Metric>>,
}

impl BatchSubmitter {
    /// Enqueues a batch for delivery, waiting while the queue is full.
    pub async fn submit(&self, batch: Vec<Metric>) {
        let _ = self.tx.send_async(batch).await;
    }
}

async fn run_worker(index: usize, rx: flume::Receiver<Vec<Metric>>, publisher: Arc<dyn Publisher>) {
    while let Ok(batch) = rx.recv_async().await {
        if batch.is_empty() {
            continue;
        }

        if let Err(error) = publisher.send_batch(&batch).await {
            vantage_log::warn!(
                "worker {index}: batch of {} rejected, falling back to single deliveries: {error}",
                batch.len()
            );
            for metric in &batch {
                if let Err(error) = publisher.send_one(metric).await {
                    vantage_log::warn!("worker {index}: dropped metric {}: {error}", metric.name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use similar_asserts::assert_eq;

    use super::*;

    #[derive(Default)]
    struct FlakyPublisher {
        batch_calls: AtomicUsize,
        single_calls: AtomicUsize,
        fail_batches: bool,
        fail_singles: bool,
    }

    #[async_trait]
    impl Publisher for FlakyPublisher {
        async fn send_batch(&self, _batch: &[Metric]) -> Result<(), PublishError> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_batches {
                Err(PublishError::new("batch endpoint unavailable"))
            } else {
                Ok(())
            }
        }

        async fn send_one(&self, _metric: &Metric) -> Result<(), PublishError> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_singles {
                Err(PublishError::new("single endpoint unavailable"))
            } else {
                Ok(())
            }
        }
    }

    fn batch(size: usize) -> Vec<Metric> {
        (0..size).map(|i| Metric::counter(format!("m{i}"), 1)).collect()
    }

    #[tokio::test]
    async fn batches_are_delivered_in_one_transfer() {
        let publisher = Arc::new(FlakyPublisher::default());
        let pool = BatchPublisher::start(Arc::clone(&publisher) as Arc<dyn Publisher>, 2);

        pool.submit(batch(3)).await;
        pool.stop().await;

        assert_eq!(publisher.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.single_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_batches_fall_back_to_single_deliveries() {
        let publisher = Arc::new(FlakyPublisher {
            fail_batches: true,
            ..FlakyPublisher::default()
        });
        let pool = BatchPublisher::start(Arc::clone(&publisher) as Arc<dyn Publisher>, 1);

        pool.submit(batch(4)).await;
        pool.stop().await;

        assert_eq!(publisher.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.single_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn single_delivery_failures_are_swallowed() {
        let publisher = Arc::new(FlakyPublisher {
            fail_batches: true,
            fail_singles: true,
            ..FlakyPublisher::default()
        });
        let pool = BatchPublisher::start(Arc::clone(&publisher) as Arc<dyn Publisher>, 1);

        pool.submit(batch(2)).await;
        pool.stop().await;

        assert_eq!(publisher.single_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_batches_never_reach_the_transport() {
        let publisher = Arc::new(FlakyPublisher::default());
        let pool = BatchPublisher::start(Arc::clone(&publisher) as Arc<dyn Publisher>, 2);

        pool.submit(Vec::new()).await;
        pool.stop().await;

        assert_eq!(publisher.batch_calls.load(Ordering::SeqCst), 0);
        assert_eq!(publisher.single_calls.load(Ordering::SeqCst), 0);
    }

    struct SlowPublisher {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delivered: AtomicUsize,
    }

    impl SlowPublisher {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                delivered: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Publisher for SlowPublisher {
        async fn send_batch(&self, _batch: &[Metric]) -> Result<(), PublishError> {
            let active = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(25)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send_one(&self, _metric: &Metric) -> Result<(), PublishError> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_deliveries_never_exceed_the_worker_count() {
        let publisher = Arc::new(SlowPublisher::new());
        let pool = BatchPublisher::start(Arc::clone(&publisher) as Arc<dyn Publisher>, 2);

        for _ in 0..5 {
            pool.submit(batch(1)).await;
        }
        pool.stop().await;

        assert_eq!(publisher.delivered.load(Ordering::SeqCst), 5);
        assert!(publisher.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn stop_drains_queued_batches() {
        let publisher = Arc::new(SlowPublisher::new());
        let pool = BatchPublisher::start(Arc::clone(&publisher) as Arc<dyn Publisher>, 1);

        let submitter = pool.submitter();
        for _ in 0..3 {
            submitter.submit(batch(1)).await;
        }
        drop(submitter);
        pool.stop().await;

        assert_eq!(publisher.delivered.load(Ordering::SeqCst), 3);
    }
}
