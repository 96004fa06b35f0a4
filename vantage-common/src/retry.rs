//! Generic retry with a fixed backoff schedule.
//!
//! [`retry`] repeats a fallible async operation while an injected predicate
//! classifies its error as transient. Backend-specific error taxonomies stay
//! with the backends; this module only ever sees `Fn(&E) -> bool`.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Default backoff schedule shared by storage-facing callers.
pub const DEFAULT_BACKOFF: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(3),
    Duration::from_secs(5),
];

/// Error returned by [`retry`].
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The cancellation token fired before the operation could finish.
    #[error("operation cancelled")]
    Cancelled,
    /// The last operation error, returned as-is once the operation failed
    /// with a non-retryable error or the schedule was exhausted.
    #[error(transparent)]
    Op(E),
}

impl<E> RetryError<E> {
    /// Returns the operation error, if any.
    pub fn into_op(self) -> Option<E> {
        match self {
            Self::Cancelled => None,
            Self::Op(error) => Some(error),
        }
    }
}

/// Repeats `op` according to the backoff schedule in `delays`.
///
/// The operation runs at most `delays.len() + 1` times. A successful attempt
/// returns immediately. After a failed attempt, in order:
///
/// 1. if `token` has already fired, [`RetryError::Cancelled`] is returned
///    (cancellation takes priority over further retries),
/// 2. if the schedule is exhausted or `is_retryable` rejects the error, the
///    error is returned unchanged,
/// 3. otherwise the next scheduled delay is awaited; a token firing during
///    the wait interrupts it and returns [`RetryError::Cancelled`] without
///    running the operation again.
pub async fn retry<T, E, P, F, Fut>(
    token: &CancellationToken,
    delays: &[Duration],
    is_retryable: P,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    P: Fn(&E) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;

    loop {
        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if token.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let Some(delay) = delays.get(attempt) else {
            return Err(RetryError::Op(error));
        };
        if !is_retryable(&error) {
            return Err(RetryError::Op(error));
        }

        tokio::select! {
            _ = token.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(*delay) => {}
        }

        attempt += 1;
    }
}
