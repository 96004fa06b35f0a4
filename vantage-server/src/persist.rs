//! Durable snapshot persistence.
//!
//! Snapshots are flattened into one ordered list of metric records and
//! written as JSON. A save always goes through a temporary file in the
//! target directory followed by an atomic rename, so concurrent readers and
//! crashed writers never observe partial content.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use std::{fs, io};

use tempfile::NamedTempFile;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use vantage_metrics::{Metric, Snapshot};

use crate::store::{Repository, StoreError};

/// Errors produced by snapshot persistence.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Reading or writing the snapshot file failed.
    #[error("snapshot io failed: {0}")]
    Io(#[from] io::Error),

    /// The snapshot file exists but does not parse.
    #[error("snapshot file is corrupt: {0}")]
    Decode(#[from] serde_json::Error),

    /// Feeding a restored snapshot into the repository failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Writes repository snapshots to a single JSON file.
#[derive(Clone, Debug)]
pub struct FilePersister {
    path: PathBuf,
}

impl FilePersister {
    /// Creates a persister writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The target path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saves the snapshot, replacing prior file content wholesale.
    ///
    /// The data is written to a freshly created temporary file next to the
    /// target and atomically renamed over it. On any failure before the
    /// rename the temporary file is removed; the target keeps its previous
    /// content.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        let mut file = NamedTempFile::new_in(dir)?;

        serde_json::to_writer_pretty(&mut file, &snapshot.metrics())?;
        file.as_file().sync_all()?;
        file.persist(&self.path)
            .map_err(|error| PersistError::Io(error.error))?;

        Ok(())
    }

    /// Restores the saved snapshot into the repository.
    ///
    /// A missing file is the first-run case and succeeds as a no-op. An
    /// existing but unparseable file is a [`PersistError::Decode`].
    pub async fn restore(&self, repository: &dyn Repository) -> Result<(), PersistError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(error) => return Err(error.into()),
        };

        let metrics: Vec<Metric> = serde_json::from_slice(&bytes)?;
        repository.update_many(&metrics).await?;
        Ok(())
    }

    /// Saves a snapshot every `interval` until the token fires, then saves
    /// once more so no update window is lost on shutdown.
    pub async fn run_periodic(
        &self,
        repository: Arc<dyn Repository>,
        interval: Duration,
        token: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the loop below should wait
        // a full interval before its first save.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.save_current(&*repository).await,
            }
        }

        self.save_current(&*repository).await;
    }

    async fn save_current(&self, repository: &dyn Repository) {
        match repository.snapshot().await {
            Ok(snapshot) => {
                if let Err(error) = self.save(&snapshot) {
                    vantage_log::error!("failed to persist snapshot: {error}");
                }
            }
            Err(error) => vantage_log::warn!("skipping snapshot save: {error}"),
        }
    }

    /// Returns a change hook that saves every snapshot it receives,
    /// for synchronous persist-on-every-write deployments.
    pub fn change_hook(self: &Arc<Self>) -> impl Fn(&Snapshot) + Send + Sync + use<> {
        let persister = Arc::clone(self);
        move |snapshot: &Snapshot| {
            if let Err(error) = persister.save(snapshot) {
                vantage_log::error!("failed to persist snapshot: {error}");
            }
        }
    }
}
