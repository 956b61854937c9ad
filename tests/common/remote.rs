//! In-memory remote object standing in for S3.

#![allow(dead_code)]

use allplay::remote_sync::{RemoteObjectStore, RemoteSyncError};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RemoteObject {
    content: Option<Vec<u8>>,
    modified: Option<DateTime<Utc>>,
    unreachable: bool,
    uploads: usize,
    downloads: usize,
}

/// Cloning shares the same object, so a test keeps a handle after giving
/// one to the session.
#[derive(Clone, Default)]
pub struct FakeRemote {
    object: Arc<Mutex<RemoteObject>>,
}

impl FakeRemote {
    /// A bucket without the catalog object.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_object(content: Vec<u8>, modified: DateTime<Utc>) -> Self {
        let remote = Self::default();
        {
            let mut object = remote.object.lock().unwrap();
            object.content = Some(content);
            object.modified = Some(modified);
        }
        remote
    }

    pub fn unreachable() -> Self {
        let remote = Self::default();
        remote.object.lock().unwrap().unreachable = true;
        remote
    }

    pub fn uploads(&self) -> usize {
        self.object.lock().unwrap().uploads
    }

    pub fn downloads(&self) -> usize {
        self.object.lock().unwrap().downloads
    }

    pub fn content(&self) -> Option<Vec<u8>> {
        self.object.lock().unwrap().content.clone()
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.object.lock().unwrap().modified
    }
}

impl RemoteObjectStore for FakeRemote {
    fn last_modified(&self) -> Result<DateTime<Utc>, RemoteSyncError> {
        let object = self.object.lock().unwrap();
        if object.unreachable {
            return Err(RemoteSyncError::Request("connection refused".to_string()));
        }
        object
            .modified
            .ok_or_else(|| RemoteSyncError::MissingObject(self.describe()))
    }

    fn download_to(&self, destination: &Path) -> Result<(), RemoteSyncError> {
        let mut object = self.object.lock().unwrap();
        object.downloads += 1;
        let content = object
            .content
            .clone()
            .ok_or_else(|| RemoteSyncError::MissingObject("fake".to_string()))?;
        fs::write(destination, content)?;
        Ok(())
    }

    fn upload_from(&self, source: &Path) -> Result<(), RemoteSyncError> {
        let content = fs::read(source)?;
        let mut object = self.object.lock().unwrap();
        object.uploads += 1;
        object.content = Some(content);
        object.modified = Some(Utc::now());
        Ok(())
    }

    fn describe(&self) -> String {
        "fake://catalog/allplay.db".to_string()
    }
}
