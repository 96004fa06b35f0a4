//! Shared utilities used across Vantage crates.

pub mod retry;

pub use retry::{DEFAULT_BACKOFF, RetryError, retry};
