use super::decision::{local_modified, should_pull, should_push};
use super::object_store::{RemoteObjectStore, RemoteSyncError};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Result of one sync phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No remote configured.
    Disabled,
    Pulled,
    Pushed,
    /// Nothing to transfer in this direction.
    UpToDate,
    /// Push skipped, there is no local file.
    LocalMissing,
    /// The remote could not be reached; the copy in hand is kept.
    Failed,
    /// Stopped by Ctrl-C. The local file is kept and goes out with the next push.
    Interrupted,
}

/// Best-effort mirror of the local catalog file.
pub struct RemoteSyncCache {
    local_path: PathBuf,
    remote: Option<Box<dyn RemoteObjectStore>>,
}

impl RemoteSyncCache {
    pub fn new(local_path: impl Into<PathBuf>, remote: Option<Box<dyn RemoteObjectStore>>) -> Self {
        Self {
            local_path: local_path.into(),
            remote,
        }
    }

    pub fn local_only(local_path: impl Into<PathBuf>) -> Self {
        Self::new(local_path, None)
    }

    pub fn is_enabled(&self) -> bool {
        self.remote.is_some()
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Replaces the local file with the remote one when the remote is newer.
    /// Never fails: errors are logged and the local copy is kept.
    pub fn pull(&self) -> SyncOutcome {
        let Some(remote) = self.remote.as_deref() else {
            debug!("Skipping sync from remote, no remote configured");
            return SyncOutcome::Disabled;
        };
        match self.try_pull(remote) {
            Ok(outcome) => outcome,
            Err(RemoteSyncError::Interrupted(_)) => {
                warn!("Sync from {} interrupted, keeping the local catalog", remote.describe());
                SyncOutcome::Interrupted
            }
            Err(err) => {
                warn!("Error attempting to sync from {}: {}", remote.describe(), err);
                SyncOutcome::Failed
            }
        }
    }

    /// Uploads the local file when it is newer than the remote one.
    /// Never fails: errors are logged and the remote is left alone.
    pub fn push(&self) -> SyncOutcome {
        let Some(remote) = self.remote.as_deref() else {
            debug!("Skipping sync to remote, no remote configured");
            return SyncOutcome::Disabled;
        };
        match self.try_push(remote) {
            Ok(outcome) => outcome,
            Err(RemoteSyncError::Interrupted(_)) => {
                warn!("Sync to {} interrupted", remote.describe());
                SyncOutcome::Interrupted
            }
            Err(err) => {
                warn!("Error attempting to sync to {}: {}", remote.describe(), err);
                SyncOutcome::Failed
            }
        }
    }

    fn try_pull(&self, remote: &dyn RemoteObjectStore) -> Result<SyncOutcome, RemoteSyncError> {
        let local = local_modified(&self.local_path)?;
        let remote_modified = remote.last_modified()?;

        if !should_pull(local, remote_modified) {
            info!(
                "Not downloading {}, local {:?} is up to date",
                remote.describe(),
                self.local_path
            );
            return Ok(SyncOutcome::UpToDate);
        }

        info!(
            "Downloading {} (modified {}) to {:?}",
            remote.describe(),
            remote_modified,
            self.local_path
        );
        let parent = match self.local_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        // Land the download next to the target so the final rename is atomic
        let staging = tempfile::NamedTempFile::new_in(parent)?;
        remote.download_to(staging.path())?;
        staging
            .as_file()
            .set_modified(SystemTime::from(remote_modified))?;
        staging
            .persist(&self.local_path)
            .map_err(|err| RemoteSyncError::Io(err.error))?;
        Ok(SyncOutcome::Pulled)
    }

    fn try_push(&self, remote: &dyn RemoteObjectStore) -> Result<SyncOutcome, RemoteSyncError> {
        let Some(local) = local_modified(&self.local_path)? else {
            warn!("Cannot sync to remote, {:?} is not a file", self.local_path);
            return Ok(SyncOutcome::LocalMissing);
        };
        let remote_modified = remote.last_modified()?;

        if !should_push(local, remote_modified) {
            info!(
                "Not uploading {:?}, {} is up to date",
                self.local_path,
                remote.describe()
            );
            return Ok(SyncOutcome::UpToDate);
        }

        info!("Uploading {:?} to {}", self.local_path, remote.describe());
        remote.upload_from(&self.local_path)?;
        Ok(SyncOutcome::Pushed)
    }
}
