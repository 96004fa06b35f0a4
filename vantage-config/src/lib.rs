//! Static configuration for the Vantage agent and server.
//!
//! Values arrive here as plain structured data. Parsing them out of files,
//! command line flags or environment variables is the embedding
//! application's concern; this crate only defines the fields, their
//! defaults, and their semantic effect.

#![warn(missing_docs)]

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vantage_log::LogConfig;

/// Configuration for the collection agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Logging configuration.
    pub logging: LogConfig,

    /// Seconds between two sampling cycles.
    pub poll_interval: u64,

    /// Seconds between two delivery cycles.
    pub report_interval: u64,

    /// Maximum number of simultaneous outgoing transfers.
    ///
    /// Values below 1 are treated as 1.
    pub rate_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            logging: LogConfig::default(),
            poll_interval: 2,
            report_interval: 10,
            rate_limit: 1,
        }
    }
}

impl AgentConfig {
    /// Interval between two sampling cycles.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    /// Interval between two delivery cycles.
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval)
    }
}

/// Configuration for the storage server.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Logging configuration.
    pub logging: LogConfig,

    /// Storage backend and persistence configuration.
    pub storage: StorageConfig,

    /// Retry behavior for operations against a networked backend.
    pub retry: RetryConfig,
}

/// Selects the storage backend and controls snapshot persistence.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Postgres DSN. When absent, the purely in-memory repository is used.
    pub database_dsn: Option<String>,

    /// Path of the snapshot file. When absent, file persistence is off.
    pub file_path: Option<PathBuf>,

    /// Seconds between two periodic snapshot saves.
    ///
    /// `0` switches to synchronous mode: a snapshot is saved after every
    /// successful update instead of on a timer.
    pub store_interval: u64,

    /// Whether to restore the snapshot file on startup.
    pub restore: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_dsn: None,
            file_path: None,
            store_interval: 300,
            restore: true,
        }
    }
}

impl StorageConfig {
    /// Interval between two periodic saves, or `None` in synchronous mode.
    pub fn store_interval(&self) -> Option<Duration> {
        match self.store_interval {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Whether every successful update should be persisted synchronously.
    pub fn sync_on_write(&self) -> bool {
        self.store_interval == 0
    }
}

/// Retry behavior for operations against a networked backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Backoff schedule: seconds to wait before each successive retry.
    ///
    /// An empty schedule disables retries entirely.
    pub backoff: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff: vec![1, 3, 5],
        }
    }
}

impl RetryConfig {
    /// The backoff schedule as durations.
    pub fn schedule(&self) -> Vec<Duration> {
        self.backoff.iter().copied().map(Duration::from_secs).collect()
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn agent_defaults() {
        let config: AgentConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.report_interval(), Duration::from_secs(10));
        assert_eq!(config.rate_limit, 1);
    }

    #[test]
    fn server_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.storage.database_dsn, None);
        assert_eq!(config.storage.file_path, None);
        assert_eq!(config.storage.store_interval(), Some(Duration::from_secs(300)));
        assert!(config.storage.restore);
        assert_eq!(
            config.retry.schedule(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(5)
            ]
        );
    }

    #[test]
    fn zero_store_interval_selects_sync_mode() {
        let config: StorageConfig =
            serde_json::from_str(r#"{"store_interval": 0, "file_path": "/tmp/metrics.json"}"#)
                .unwrap();
        assert!(config.sync_on_write());
        assert_eq!(config.store_interval(), None);
    }

    #[test]
    fn partial_overrides_keep_remaining_defaults() {
        let config: AgentConfig =
            serde_json::from_str(r#"{"poll_interval": 1, "rate_limit": 4}"#).unwrap();
        assert_eq!(config.poll_interval, 1);
        assert_eq!(config.report_interval, 10);
        assert_eq!(config.rate_limit, 4);
    }
}
