//! One cataloged entry as seen by the player and the menu.

use crate::catalog_store::{normalize_path, CatalogError, CatalogResult, CatalogStore, MediaEntry};
use crate::interrupt::{InterruptFlag, Interrupted};
use crate::scanner::{is_hidden, MediaExtensions};
use byte_unit::{Byte, UnitType};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// What [`MediaItem::reconcile`] found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// Still on disk with these playable files.
    Present(Vec<PathBuf>),
    /// A directory without playable files, now tagged as non-media.
    MarkedNonMedia,
    /// Gone from disk, removed from the catalog.
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    full_path: PathBuf,
    entry: MediaEntry,
}

impl MediaItem {
    /// Looks up `full_path` in the store's view.
    pub fn from_store(store: &CatalogStore, full_path: &Path) -> CatalogResult<Self> {
        let entry = store
            .entry(full_path)
            .ok_or_else(|| CatalogError::NotFound(format!("{:?}", full_path)))?;
        Ok(Self {
            full_path: full_path.to_path_buf(),
            entry: entry.clone(),
        })
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    pub fn entry(&self) -> &MediaEntry {
        &self.entry
    }

    pub fn media_id(&self) -> i64 {
        self.entry.media_id
    }

    pub fn exists(&self) -> bool {
        self.full_path.exists()
    }

    /// Playable files of this entry, sorted. A file entry yields itself.
    pub fn files(
        &self,
        extensions: &MediaExtensions,
        interrupt: &InterruptFlag,
    ) -> Result<Vec<PathBuf>, Interrupted> {
        if self.full_path.is_file() {
            return Ok(vec![self.full_path.clone()]);
        }

        let walker = WalkDir::new(&self.full_path)
            .follow_links(true)
            .into_iter()
            .filter_entry(|dir_entry| dir_entry.depth() == 0 || !is_hidden(dir_entry.file_name()));
        let mut files = Vec::new();
        for dir_entry in walker {
            interrupt.check()?;
            match dir_entry {
                Ok(dir_entry)
                    if dir_entry.file_type().is_file() && extensions.matches(dir_entry.path()) =>
                {
                    files.push(dir_entry.into_path())
                }
                Ok(_) => {}
                Err(err) => warn!("Skipping unreadable path below {:?}: {}", self.full_path, err),
            }
        }
        files.sort();
        Ok(files)
    }

    /// Total size of `files`, e.g. `1.50 MiB`.
    pub fn size(files: &[PathBuf]) -> String {
        let total: u64 = files
            .iter()
            .filter_map(|file| match fs::metadata(file) {
                Ok(metadata) => Some(metadata.len()),
                Err(err) => {
                    warn!("Cannot stat {:?}: {}", file, err);
                    None
                }
            })
            .sum();
        format!(
            "{:.2}",
            Byte::from_u64(total).get_appropriate_unit(UnitType::Binary)
        )
    }

    /// Brings the catalog in line with the disk for this entry.
    pub fn reconcile(
        &self,
        store: &mut CatalogStore,
        extensions: &MediaExtensions,
        interrupt: &InterruptFlag,
    ) -> CatalogResult<Reconciled> {
        if !self.exists() {
            info!("{:?} no longer exists, removing it from the catalog", self.full_path);
            store.delete(&self.full_path)?;
            return Ok(Reconciled::Removed);
        }

        let files = self.files(extensions, interrupt)?;
        if files.is_empty() && self.full_path.is_dir() {
            info!("No playable files in {:?}", self.full_path);
            store.tags(self.media_id()).add(store.non_media_tag())?;
            return Ok(Reconciled::MarkedNonMedia);
        }
        Ok(Reconciled::Present(files))
    }

    /// Deletes one playable file of this entry from disk, then reconciles.
    ///
    /// A directory left without playable files gets the non-media tag; a
    /// file entry deleting itself is dropped from the catalog. Paths outside
    /// the entry are refused.
    pub fn delete_file(
        &self,
        store: &mut CatalogStore,
        file: &Path,
        extensions: &MediaExtensions,
        interrupt: &InterruptFlag,
    ) -> CatalogResult<Reconciled> {
        let file = normalize_path(file);
        if !file.starts_with(&self.full_path) {
            warn!("Refusing to delete {:?}, it is outside {:?}", file, self.full_path);
            return Err(CatalogError::ProtectedPath {
                path: file,
                reason: "not part of the catalog entry",
            });
        }
        match fs::metadata(&file) {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(CatalogError::NotFound(format!("file {:?}", file))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(CatalogError::NotFound(format!("file {:?}", file)))
            }
            Err(err) => return Err(err.into()),
        }

        fs::remove_file(&file)?;
        info!("Deleted {:?} from disk", file);
        self.reconcile(store, extensions, interrupt)
    }

    /// Removes the entry from disk and from the catalog. Source roots and the
    /// filesystem root are refused before anything is touched.
    pub fn delete_from_disk(self, store: &mut CatalogStore) -> CatalogResult<MediaEntry> {
        if let Some(reason) = store.sources().protection_reason(&self.full_path) {
            warn!("Refusing to delete {:?}: {}", self.full_path, reason);
            return Err(CatalogError::ProtectedPath {
                path: self.full_path,
                reason,
            });
        }

        let metadata = match fs::symlink_metadata(&self.full_path) {
            Ok(metadata) => Some(metadata),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        match metadata {
            Some(metadata) if metadata.is_dir() => fs::remove_dir_all(&self.full_path)?,
            Some(_) => fs::remove_file(&self.full_path)?,
            None => warn!("{:?} is already gone from disk", self.full_path),
        }
        info!("Deleted {:?} from disk", self.full_path);

        store.delete(&self.full_path)
    }

    /// Moves the entry on disk into another source and updates the catalog.
    ///
    /// An interrupted copy is cleaned up and the entry stays where it was.
    pub fn move_to_source(
        self,
        store: &mut CatalogStore,
        alias: &str,
        interrupt: &InterruptFlag,
    ) -> CatalogResult<MediaItem> {
        interrupt.check()?;
        let root = store
            .sources()
            .root(alias)
            .ok_or_else(|| CatalogError::NotFound(format!("media source {:?}", alias)))?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("media source root {:?} is not a directory", root),
            )
            .into());
        }
        let destination = root.join(&self.entry.relative_path);
        if fs::symlink_metadata(&destination).is_ok() {
            warn!("Cannot move {:?}, {:?} already exists", self.full_path, destination);
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{:?} already exists", destination),
            )
            .into());
        }

        move_path(&self.full_path, &destination, interrupt)?;
        let new_path = match store.relocate(&self.full_path, alias) {
            Ok(new_path) => new_path,
            Err(err) => {
                // The undo runs to completion even after Ctrl-C
                let undo = move_path(&destination, &self.full_path, &InterruptFlag::new());
                if let Err(undo_err) = undo {
                    warn!(
                        "Could not move {:?} back after failed catalog update: {}",
                        destination, undo_err
                    );
                }
                return Err(err);
            }
        };

        let entry = MediaEntry {
            mount_alias: alias.to_string(),
            ..self.entry
        };
        Ok(MediaItem {
            full_path: new_path,
            entry,
        })
    }
}

/// Renames, falling back to copy and delete when source and destination sit
/// on different filesystems.
fn move_path(from: &Path, to: &Path, interrupt: &InterruptFlag) -> CatalogResult<()> {
    match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(err) => debug!("Rename {:?} -> {:?} failed ({}), copying instead", from, to, err),
    }

    let copied = if fs::symlink_metadata(from)?.is_dir() {
        copy_tree(from, to, interrupt)
    } else {
        fs::copy(from, to).map(|_| ()).map_err(CatalogError::from)
    };
    if let Err(err) = copied {
        let cleanup = if to.is_dir() {
            fs::remove_dir_all(to)
        } else {
            fs::remove_file(to)
        };
        if let Err(cleanup_err) = cleanup {
            debug!("Could not clean up partial copy {:?}: {}", to, cleanup_err);
        }
        return Err(err);
    }

    if from.is_dir() {
        fs::remove_dir_all(from)?;
    } else {
        fs::remove_file(from)?;
    }
    Ok(())
}

fn copy_tree(from: &Path, to: &Path, interrupt: &InterruptFlag) -> CatalogResult<()> {
    for dir_entry in WalkDir::new(from) {
        interrupt.check()?;
        let dir_entry = dir_entry.map_err(io::Error::from)?;
        let relative = dir_entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let target = to.join(relative);
        if dir_entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(dir_entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{MediaSources, ScanBatch, StagedEntry, StagedKind};
    use tempfile::TempDir;

    fn create_store(root: &Path, names: &[&str]) -> CatalogStore {
        let mut sources = MediaSources::new();
        sources.insert("movies", root);
        let mut store = CatalogStore::open_in_memory(sources, "non_media").unwrap();
        let mut batch = ScanBatch::default();
        for name in names {
            batch.stage(
                root.join(name),
                StagedEntry {
                    mount_alias: "movies".to_string(),
                    relative_path: name.to_string(),
                    modified_time: 0,
                    kind: StagedKind::Media,
                },
            );
        }
        store.merge(&batch).unwrap();
        store
    }

    fn mp4() -> MediaExtensions {
        MediaExtensions::new(["mp4", "mkv"])
    }

    #[test]
    fn test_files_are_sorted_and_skip_hidden() {
        let temp_dir = TempDir::new().unwrap();
        let trip = temp_dir.path().join("Trip");
        fs::create_dir_all(trip.join("Day 2")).unwrap();
        fs::create_dir_all(trip.join(".thumbs")).unwrap();
        fs::write(trip.join("b.mkv"), b"x").unwrap();
        fs::write(trip.join("a.mp4"), b"x").unwrap();
        fs::write(trip.join("notes.txt"), b"x").unwrap();
        fs::write(trip.join("Day 2/c.MP4"), b"x").unwrap();
        fs::write(trip.join(".thumbs/d.mp4"), b"x").unwrap();
        let store = create_store(temp_dir.path(), &["Trip"]);

        let item = MediaItem::from_store(&store, &trip).unwrap();

        assert_eq!(
            item.files(&mp4(), &InterruptFlag::new()).unwrap(),
            vec![trip.join("Day 2/c.MP4"), trip.join("a.mp4"), trip.join("b.mkv")]
        );
    }

    #[test]
    fn test_file_entry_is_its_own_file() {
        let temp_dir = TempDir::new().unwrap();
        let clip = temp_dir.path().join("clip.mp4");
        fs::write(&clip, vec![0u8; 2048]).unwrap();
        let store = create_store(temp_dir.path(), &["clip.mp4"]);

        let item = MediaItem::from_store(&store, &clip).unwrap();
        let files = item.files(&mp4(), &InterruptFlag::new()).unwrap();

        assert_eq!(files, vec![clip.clone()]);
        assert!(MediaItem::size(&files).ends_with("KiB"));
    }

    #[test]
    fn test_reconcile_removes_vanished_entry() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = create_store(temp_dir.path(), &["Gone"]);
        let item = MediaItem::from_store(&store, &temp_dir.path().join("Gone")).unwrap();

        assert_eq!(
            item.reconcile(&mut store, &mp4(), &InterruptFlag::new()).unwrap(),
            Reconciled::Removed
        );
        assert_eq!(store.media_count().unwrap(), 0);
    }

    #[test]
    fn test_reconcile_marks_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("Empty")).unwrap();
        fs::write(temp_dir.path().join("Empty/readme.txt"), b"x").unwrap();
        let mut store = create_store(temp_dir.path(), &["Empty"]);
        let item = MediaItem::from_store(&store, &temp_dir.path().join("Empty")).unwrap();

        assert_eq!(
            item.reconcile(&mut store, &mp4(), &InterruptFlag::new()).unwrap(),
            Reconciled::MarkedNonMedia
        );
        assert!(store.tags(item.media_id()).contains("non_media").unwrap());
    }

    #[test]
    fn test_delete_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let trip = temp_dir.path().join("Trip");
        fs::create_dir_all(&trip).unwrap();
        fs::write(trip.join("a.mp4"), b"x").unwrap();
        let mut store = create_store(temp_dir.path(), &["Trip"]);
        let item = MediaItem::from_store(&store, &trip).unwrap();

        item.delete_from_disk(&mut store).unwrap();

        assert!(!trip.exists());
        assert!(store.is_empty());
        assert_eq!(store.media_count().unwrap(), 0);
    }

    #[test]
    fn test_move_to_source() {
        let temp_dir = TempDir::new().unwrap();
        let movies = temp_dir.path().join("movies");
        let archive = temp_dir.path().join("archive");
        fs::create_dir_all(movies.join("Trip")).unwrap();
        fs::create_dir_all(&archive).unwrap();
        fs::write(movies.join("Trip/a.mp4"), b"x").unwrap();
        let mut sources = MediaSources::new();
        sources.insert("movies", &movies);
        sources.insert("archive", &archive);
        let mut store = CatalogStore::open_in_memory(sources, "non_media").unwrap();
        let mut batch = ScanBatch::default();
        batch.stage(
            movies.join("Trip"),
            StagedEntry {
                mount_alias: "movies".to_string(),
                relative_path: "Trip".to_string(),
                modified_time: 0,
                kind: StagedKind::Media,
            },
        );
        store.merge(&batch).unwrap();
        let item = MediaItem::from_store(&store, &movies.join("Trip")).unwrap();
        let media_id = item.media_id();

        let moved = item
            .move_to_source(&mut store, "archive", &InterruptFlag::new())
            .unwrap();

        assert_eq!(moved.full_path(), archive.join("Trip"));
        assert_eq!(moved.media_id(), media_id);
        assert_eq!(moved.entry().mount_alias, "archive");
        assert!(archive.join("Trip/a.mp4").exists());
        assert!(!movies.join("Trip").exists());
        assert!(store.entry(&archive.join("Trip")).is_some());
    }

    #[test]
    fn test_move_to_source_refuses_existing_destination() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.mp4"), b"x").unwrap();
        let store_root = temp_dir.path().join("other");
        fs::create_dir_all(&store_root).unwrap();
        fs::write(store_root.join("a.mp4"), b"y").unwrap();
        let mut sources = MediaSources::new();
        sources.insert("movies", temp_dir.path());
        sources.insert("other", &store_root);
        let mut store = CatalogStore::open_in_memory(sources, "non_media").unwrap();
        let mut batch = ScanBatch::default();
        batch.stage(
            temp_dir.path().join("a.mp4"),
            StagedEntry {
                mount_alias: "movies".to_string(),
                relative_path: "a.mp4".to_string(),
                modified_time: 0,
                kind: StagedKind::Media,
            },
        );
        store.merge(&batch).unwrap();
        let item = MediaItem::from_store(&store, &temp_dir.path().join("a.mp4")).unwrap();

        assert!(matches!(
            item.move_to_source(&mut store, "other", &InterruptFlag::new()),
            Err(CatalogError::Io(_))
        ));
        assert_eq!(fs::read(temp_dir.path().join("a.mp4")).unwrap(), b"x");
        assert_eq!(fs::read(store_root.join("a.mp4")).unwrap(), b"y");
    }

    #[test]
    fn test_copy_tree() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("from");
        fs::create_dir_all(from.join("sub")).unwrap();
        fs::write(from.join("a.mp4"), b"a").unwrap();
        fs::write(from.join("sub/b.mp4"), b"b").unwrap();
        let to = temp_dir.path().join("to");

        copy_tree(&from, &to, &InterruptFlag::new()).unwrap();

        assert_eq!(fs::read(to.join("a.mp4")).unwrap(), b"a");
        assert_eq!(fs::read(to.join("sub/b.mp4")).unwrap(), b"b");
        assert!(from.join("sub/b.mp4").exists());
    }

    #[test]
    fn test_delete_from_disk_refuses_source_root() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.mp4"), b"x").unwrap();
        let mut store = create_store(temp_dir.path(), &["a.mp4"]);
        let entry = store.entry(&temp_dir.path().join("a.mp4")).unwrap().clone();
        let item = MediaItem {
            full_path: temp_dir.path().to_path_buf(),
            entry,
        };

        assert!(matches!(
            item.delete_from_disk(&mut store),
            Err(CatalogError::ProtectedPath { .. })
        ));
        assert!(temp_dir.path().join("a.mp4").exists());
        assert_eq!(store.media_count().unwrap(), 1);
    }

    #[test]
    fn test_interrupted_copy_tree() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("from");
        fs::create_dir_all(&from).unwrap();
        fs::write(from.join("a.mp4"), b"a").unwrap();
        let interrupt = InterruptFlag::new();
        interrupt.trigger();

        assert!(matches!(
            copy_tree(&from, &temp_dir.path().join("to"), &interrupt),
            Err(CatalogError::Interrupted(_))
        ));
        assert!(!temp_dir.path().join("to").exists());
    }

    #[test]
    fn test_interrupted_walk_lists_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let trip = temp_dir.path().join("Trip");
        fs::create_dir_all(&trip).unwrap();
        fs::write(trip.join("a.mp4"), b"x").unwrap();
        let mut store = create_store(temp_dir.path(), &["Trip"]);
        let item = MediaItem::from_store(&store, &trip).unwrap();
        let interrupt = InterruptFlag::new();
        interrupt.trigger();

        assert_eq!(item.files(&mp4(), &interrupt), Err(Interrupted));
        assert!(matches!(
            item.reconcile(&mut store, &mp4(), &interrupt),
            Err(CatalogError::Interrupted(_))
        ));
        assert!(store.tags(item.media_id()).list().unwrap().is_empty());
    }

    #[test]
    fn test_delete_last_file_marks_group_non_media() {
        let temp_dir = TempDir::new().unwrap();
        let trip = temp_dir.path().join("Trip");
        fs::create_dir_all(&trip).unwrap();
        fs::write(trip.join("a.mp4"), b"x").unwrap();
        fs::write(trip.join("b.mkv"), b"x").unwrap();
        fs::write(trip.join("notes.txt"), b"x").unwrap();
        let mut store = create_store(temp_dir.path(), &["Trip"]);
        let item = MediaItem::from_store(&store, &trip).unwrap();
        let interrupt = InterruptFlag::new();

        assert_eq!(
            item.delete_file(&mut store, &trip.join("a.mp4"), &mp4(), &interrupt)
                .unwrap(),
            Reconciled::Present(vec![trip.join("b.mkv")])
        );
        assert!(!trip.join("a.mp4").exists());

        assert_eq!(
            item.delete_file(&mut store, &trip.join("b.mkv"), &mp4(), &interrupt)
                .unwrap(),
            Reconciled::MarkedNonMedia
        );
        assert!(trip.join("notes.txt").exists());
        assert!(store.tags(item.media_id()).contains("non_media").unwrap());
        assert!(store.entry(&trip).is_some());
    }

    #[test]
    fn test_delete_file_of_file_entry_removes_it() {
        let temp_dir = TempDir::new().unwrap();
        let clip = temp_dir.path().join("clip.mp4");
        fs::write(&clip, b"x").unwrap();
        let mut store = create_store(temp_dir.path(), &["clip.mp4"]);
        let item = MediaItem::from_store(&store, &clip).unwrap();

        assert_eq!(
            item.delete_file(&mut store, &clip, &mp4(), &InterruptFlag::new())
                .unwrap(),
            Reconciled::Removed
        );
        assert!(!clip.exists());
        assert_eq!(store.media_count().unwrap(), 0);
    }

    #[test]
    fn test_delete_file_refuses_paths_outside_entry() {
        let temp_dir = TempDir::new().unwrap();
        let trip = temp_dir.path().join("Trip");
        fs::create_dir_all(&trip).unwrap();
        fs::write(trip.join("a.mp4"), b"x").unwrap();
        fs::write(temp_dir.path().join("other.mp4"), b"x").unwrap();
        let mut store = create_store(temp_dir.path(), &["Trip"]);
        let item = MediaItem::from_store(&store, &trip).unwrap();
        let interrupt = InterruptFlag::new();

        assert!(matches!(
            item.delete_file(&mut store, &temp_dir.path().join("other.mp4"), &mp4(), &interrupt),
            Err(CatalogError::ProtectedPath { .. })
        ));
        assert!(matches!(
            item.delete_file(&mut store, &trip.join("../other.mp4"), &mp4(), &interrupt),
            Err(CatalogError::ProtectedPath { .. })
        ));
        assert!(matches!(
            item.delete_file(&mut store, &trip, &mp4(), &interrupt),
            Err(CatalogError::NotFound(_))
        ));
        assert!(temp_dir.path().join("other.mp4").exists());
        assert!(trip.join("a.mp4").exists());
    }
}
