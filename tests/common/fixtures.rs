//! On-disk media library used by end-to-end tests.

#![allow(dead_code)]

use super::constants::*;
use super::remote::FakeRemote;
use allplay::catalog_store::MediaSources;
use allplay::remote_sync::RemoteSyncCache;
use allplay::scanner::MediaExtensions;
use allplay::{InterruptFlag, Session, SessionSettings};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Two media sources and a catalog location inside one temp dir.
///
/// Layout of the `tv` source:
/// - `Trip/clip.mp4`, `Trip/thumbs/1.jpg`
/// - `Notes/readme.txt`
/// - `pilot.mkv`, `cover.jpg`, `.hidden.mkv`
///
/// The `movies` source holds `feature.mp4`.
pub struct TestLibrary {
    _dir: TempDir,
    pub base: PathBuf,
    pub db_path: PathBuf,
    pub tv_root: PathBuf,
    pub movies_root: PathBuf,
}

impl TestLibrary {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let base = dir.path().canonicalize().unwrap();

        let tv_root = base.join("media").join(TV_ALIAS);
        fs::create_dir_all(tv_root.join(TRIP_DIR).join("thumbs")).unwrap();
        fs::write(tv_root.join(TRIP_DIR).join("clip.mp4"), b"clip").unwrap();
        fs::write(tv_root.join(TRIP_DIR).join("thumbs/1.jpg"), b"thumb").unwrap();
        fs::create_dir_all(tv_root.join(NOTES_DIR)).unwrap();
        fs::write(tv_root.join(NOTES_DIR).join("readme.txt"), b"notes").unwrap();
        fs::write(tv_root.join(PILOT_FILE), b"pilot").unwrap();
        fs::write(tv_root.join("cover.jpg"), b"cover").unwrap();
        fs::write(tv_root.join(".hidden.mkv"), b"hidden").unwrap();

        let movies_root = base.join("media").join(MOVIES_ALIAS);
        fs::create_dir_all(&movies_root).unwrap();
        fs::write(movies_root.join(FEATURE_FILE), b"feature").unwrap();

        Self {
            db_path: base.join("state").join("allplay.db"),
            _dir: dir,
            base,
            tv_root,
            movies_root,
        }
    }

    pub fn sources(&self) -> MediaSources {
        let mut sources = MediaSources::new();
        sources.insert(TV_ALIAS, &self.tv_root);
        sources.insert(MOVIES_ALIAS, &self.movies_root);
        sources
    }

    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            database_path: self.db_path.clone(),
            sources: self.sources(),
            extensions: MediaExtensions::new(TEST_EXTENSIONS.iter().copied()),
            non_media_tag: NON_MEDIA_TAG.to_string(),
            local_scan_delay: Duration::ZERO,
        }
    }

    pub fn open_local(&self) -> Session {
        Session::open(
            self.settings(),
            RemoteSyncCache::local_only(&self.db_path),
            InterruptFlag::new(),
        )
        .unwrap()
    }

    pub fn open_with_remote(&self, remote: &FakeRemote) -> Session {
        Session::open(
            self.settings(),
            RemoteSyncCache::new(&self.db_path, Some(Box::new(remote.clone()))),
            InterruptFlag::new(),
        )
        .unwrap()
    }

    /// Scans everything into a fresh catalog file and closes it.
    pub fn seed_catalog(&self) {
        let mut session = self.open_local();
        session.refresh().unwrap();
        session.close().unwrap();
    }

    pub fn tv_path(&self, name: &str) -> PathBuf {
        self.tv_root.join(name)
    }

    pub fn movies_path(&self, name: &str) -> PathBuf {
        self.movies_root.join(name)
    }
}

pub fn set_mtime(path: &Path, at: DateTime<Utc>) {
    filetime::set_file_mtime(path, FileTime::from_unix_time(at.timestamp(), 0)).unwrap();
}
