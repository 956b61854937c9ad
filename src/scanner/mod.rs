//! Discovers new entries at the top level of a media source.

mod extensions;
mod probe;

pub use extensions::{is_hidden, MediaExtensions};
pub use probe::contains_media;

use crate::catalog_store::{CatalogView, ScanBatch, StagedEntry, StagedKind};
use crate::interrupt::{InterruptFlag, Interrupted};
use std::fs::{self, DirEntry};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Scan interrupted")]
    Interrupted,

    #[error("Cannot read media source {root:?}: {source}")]
    ReadRoot {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot classify {path:?}: {source}")]
    Transient {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot catalog {path:?}: file name is not valid UTF-8")]
    NonUtf8Name { path: PathBuf },
}

impl ScanError {
    /// Errors that only affect one entry of the scan.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScanError::Transient { .. } | ScanError::NonUtf8Name { .. })
    }
}

impl From<Interrupted> for ScanError {
    fn from(_: Interrupted) -> Self {
        ScanError::Interrupted
    }
}

/// Classifies the top-level entries of media sources.
pub struct Scanner<'a> {
    extensions: &'a MediaExtensions,
    interrupt: InterruptFlag,
}

impl<'a> Scanner<'a> {
    pub fn new(extensions: &'a MediaExtensions, interrupt: InterruptFlag) -> Self {
        Self {
            extensions,
            interrupt,
        }
    }

    /// Stages every top-level entry of `root` that is not already in `view`.
    ///
    /// Failures on single entries are logged and skipped. Only an unreadable
    /// root or an interrupt abort the scan.
    pub fn scan_root(
        &self,
        alias: &str,
        root: &Path,
        view: &CatalogView,
    ) -> Result<ScanBatch, ScanError> {
        info!("Scanning {} ({:?})", alias, root);
        let read_dir = fs::read_dir(root).map_err(|source| ScanError::ReadRoot {
            root: root.to_path_buf(),
            source,
        })?;

        let mut batch = ScanBatch::default();
        for dir_entry in read_dir {
            self.interrupt.check()?;

            let dir_entry = match dir_entry {
                Ok(dir_entry) => dir_entry,
                Err(err) => {
                    warn!("Skipping unreadable entry in {:?}: {}", root, err);
                    continue;
                }
            };
            match self.classify(alias, &dir_entry, view) {
                Ok(Some(staged)) => batch.stage(dir_entry.path(), staged),
                Ok(None) => {}
                Err(err) if err.is_transient() => warn!("{}", err),
                Err(err) => return Err(err),
            }
        }

        let (media, non_media) = batch.partition();
        info!(
            "Scanned {}: {} new media, {} new non-media",
            alias,
            media.len(),
            non_media.len()
        );
        Ok(batch)
    }

    fn classify(
        &self,
        alias: &str,
        dir_entry: &DirEntry,
        view: &CatalogView,
    ) -> Result<Option<StagedEntry>, ScanError> {
        let name = dir_entry.file_name();
        if is_hidden(&name) {
            return Ok(None);
        }
        let path = dir_entry.path();
        if view.contains(&path) {
            return Ok(None);
        }

        let relative_path = name
            .to_str()
            .ok_or_else(|| ScanError::NonUtf8Name { path: path.clone() })?
            .to_string();

        // Follows symlinks, a broken one ends up as NotFound
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("Ignoring {:?}: neither a file nor a directory", path);
                return Ok(None);
            }
            Err(source) => return Err(ScanError::Transient { path, source }),
        };
        let modified_time = metadata
            .modified()
            .map_err(|source| ScanError::Transient {
                path: path.clone(),
                source,
            })?
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or(0);

        let kind = if metadata.is_file() {
            if !self.extensions.matches(&path) {
                debug!("Not a media file: {:?}", path);
                return Ok(None);
            }
            StagedKind::Media
        } else if metadata.is_dir() {
            debug!("Probing directory {:?}", path);
            if contains_media(&path, self.extensions, &self.interrupt)? {
                StagedKind::Media
            } else {
                info!("No media found in {:?}", path);
                StagedKind::NonMedia
            }
        } else {
            warn!("Ignoring {:?}: neither a file nor a directory", path);
            return Ok(None);
        };

        debug!("Staging {:?} as {:?}", path, kind);
        Ok(Some(StagedEntry {
            mount_alias: alias.to_string(),
            relative_path,
            modified_time,
            kind,
        }))
    }
}
