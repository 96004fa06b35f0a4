//! Fan-out of domain events to audit observers.

use std::error::Error;
use std::sync::Arc;

use parking_lot::RwLock;
use vantage_metrics::Metric;

/// A domain event published to audit observers.
#[derive(Clone, Debug, PartialEq)]
pub enum AuditEvent {
    /// A single metric was created or updated.
    MetricUpserted {
        /// The metric after the update was applied.
        metric: Metric,
    },
    /// A validated batch was written to the repository.
    BatchApplied {
        /// Number of items in the written batch.
        applied: usize,
    },
}

/// Error an observer may return. It only ever reaches the registered error
/// handler, never the publishing caller.
#[derive(Debug, thiserror::Error)]
#[error("audit observer failed: {0}")]
pub struct AuditError(Box<dyn Error + Send + Sync>);

impl AuditError {
    /// Wraps an arbitrary error.
    pub fn new(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self(source.into())
    }
}

/// A sink for audit events, e.g. a file or a remote collector.
pub trait AuditObserver: Send + Sync {
    /// Handles one event. Failures are isolated per observer.
    fn notify(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Observer that writes every event to the log.
#[derive(Debug, Default)]
pub struct LogObserver;

impl AuditObserver for LogObserver {
    fn notify(&self, event: &AuditEvent) -> Result<(), AuditError> {
        match event {
            AuditEvent::MetricUpserted { metric } => {
                vantage_log::info!("audit: upserted {} {}", metric.kind(), metric.name);
            }
            AuditEvent::BatchApplied { applied } => {
                vantage_log::info!("audit: batch of {applied} applied");
            }
        }
        Ok(())
    }
}

type ErrorHandler = Box<dyn Fn(&AuditError) + Send + Sync>;

/// Synchronous fan-out notifier for [`AuditEvent`]s.
///
/// Observers are notified in attachment order. An observer returning an
/// error triggers the registered error handler but neither stops later
/// observers nor reaches the publishing caller. A subject without observers
/// is a no-op.
#[derive(Default)]
pub struct AuditSubject {
    observers: RwLock<Vec<Arc<dyn AuditObserver>>>,
    on_error: RwLock<Option<ErrorHandler>>,
}

impl AuditSubject {
    /// Creates a subject with no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observer. Safe to call concurrently with
    /// [`publish`](Self::publish).
    pub fn attach(&self, observer: Arc<dyn AuditObserver>) {
        self.observers.write().push(observer);
    }

    /// Appends several observers, preserving their order.
    pub fn attach_all(&self, observers: impl IntoIterator<Item = Arc<dyn AuditObserver>>) {
        self.observers.write().extend(observers);
    }

    /// Registers the handler invoked for every observer error.
    pub fn set_error_handler(&self, handler: impl Fn(&AuditError) + Send + Sync + 'static) {
        *self.on_error.write() = Some(Box::new(handler));
    }

    /// Notifies every currently attached observer.
    ///
    /// The observer list is copied under the lock and invoked outside of
    /// it, so slow or reentrant observers never block `attach`.
    pub fn publish(&self, event: &AuditEvent) {
        let observers = self.observers.read().clone();
        for observer in observers {
            if let Err(error) = observer.notify(event) {
                match &*self.on_error.read() {
                    Some(handler) => handler(&error),
                    None => vantage_log::warn!("{error}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use similar_asserts::assert_eq;

    use super::*;

    struct Counting(AtomicUsize);

    impl AuditObserver for Counting {
        fn notify(&self, _event: &AuditEvent) -> Result<(), AuditError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl AuditObserver for Failing {
        fn notify(&self, _event: &AuditEvent) -> Result<(), AuditError> {
            Err(AuditError::new("observer exploded"))
        }
    }

    #[test]
    fn publish_without_observers_is_a_noop() {
        let subject = AuditSubject::new();
        subject.publish(&AuditEvent::BatchApplied { applied: 1 });
    }

    #[test]
    fn observers_are_notified_in_attachment_order() {
        let subject = AuditSubject::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        struct Recording(Arc<Mutex<Vec<&'static str>>>, &'static str);
        impl AuditObserver for Recording {
            fn notify(&self, _event: &AuditEvent) -> Result<(), AuditError> {
                self.0.lock().unwrap().push(self.1);
                Ok(())
            }
        }

        subject.attach_all([
            Arc::new(Recording(Arc::clone(&order), "first")) as Arc<dyn AuditObserver>,
            Arc::new(Recording(Arc::clone(&order), "second")),
        ]);
        subject.publish(&AuditEvent::BatchApplied { applied: 2 });

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn observer_failures_are_isolated() {
        let subject = AuditSubject::new();
        let errors = Arc::new(AtomicUsize::new(0));
        {
            let errors = Arc::clone(&errors);
            subject.set_error_handler(move |_| {
                errors.fetch_add(1, Ordering::SeqCst);
            });
        }

        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        subject.attach(Arc::new(Failing));
        subject.attach(Arc::clone(&counting) as Arc<dyn AuditObserver>);

        subject.publish(&AuditEvent::BatchApplied { applied: 3 });

        // The failure reached the handler and the second observer still ran.
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attach_races_publish_without_deadlock() {
        let subject = Arc::new(AuditSubject::new());
        let publisher = {
            let subject = Arc::clone(&subject);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    subject.publish(&AuditEvent::BatchApplied { applied: 1 });
                }
            })
        };

        for _ in 0..100 {
            subject.attach(Arc::new(Counting(AtomicUsize::new(0))));
        }
        publisher.join().unwrap();
    }
}
