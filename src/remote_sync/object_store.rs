use crate::interrupt::Interrupted;
use chrono::{DateTime, Utc};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteSyncError {
    #[error("Remote object {0} does not exist")]
    MissingObject(String),

    #[error("Remote object {0} has no usable last-modified time")]
    MissingTimestamp(String),

    #[error("Remote request failed: {0}")]
    Request(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

/// The single remote object mirroring the local catalog file.
pub trait RemoteObjectStore {
    fn last_modified(&self) -> Result<DateTime<Utc>, RemoteSyncError>;

    /// Writes the object's content to `destination`, replacing it.
    fn download_to(&self, destination: &Path) -> Result<(), RemoteSyncError>;

    fn upload_from(&self, source: &Path) -> Result<(), RemoteSyncError>;

    /// Human readable location, for logs.
    fn describe(&self) -> String;
}
