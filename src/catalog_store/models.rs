use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A snapshot of one row of the `media` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    pub media_id: i64,
    pub mount_alias: String,
    pub relative_path: String,
    /// Unix seconds.
    pub modified_time: i64,
    pub times_played: i64,
}

impl MediaEntry {
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.modified_time, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedKind {
    /// A matching file, or a directory with at least one matching descendant.
    Media,
    /// A directory without any matching descendant.
    NonMedia,
}

/// A scanned entry waiting to be merged into the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEntry {
    pub mount_alias: String,
    pub relative_path: String,
    pub modified_time: i64,
    pub kind: StagedKind,
}

/// Entries staged by one scan, keyed by full path.
#[derive(Debug, Default)]
pub struct ScanBatch {
    entries: BTreeMap<PathBuf, StagedEntry>,
}

impl ScanBatch {
    pub fn stage(&mut self, full_path: PathBuf, entry: StagedEntry) {
        self.entries.insert(full_path, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, full_path: &Path) -> Option<&StagedEntry> {
        self.entries.get(full_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &StagedEntry)> {
        self.entries.iter().map(|(path, entry)| (path.as_path(), entry))
    }

    /// Splits the batch into (media, non-media) paths.
    pub fn partition(&self) -> (Vec<&Path>, Vec<&Path>) {
        let (media, non_media): (Vec<_>, Vec<_>) = self
            .entries
            .iter()
            .partition(|(_, entry)| entry.kind == StagedKind::Media);
        (
            media.into_iter().map(|(path, _)| path.as_path()).collect(),
            non_media.into_iter().map(|(path, _)| path.as_path()).collect(),
        )
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: usize,
    pub already_present: usize,
    pub sentinel_tagged: usize,
}

impl MergeReport {
    pub fn absorb(&mut self, other: MergeReport) {
        self.inserted += other.inserted;
        self.already_present += other.already_present;
        self.sentinel_tagged += other.sentinel_tagged;
    }
}
