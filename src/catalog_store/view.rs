use super::models::MediaEntry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// In-memory snapshot of the catalog, keyed by full path.
///
/// Iteration follows insertion order: the order of the query that filled
/// the view, followed by entries merged afterwards.
#[derive(Debug, Default)]
pub struct CatalogView {
    order: Vec<PathBuf>,
    entries: HashMap<PathBuf, MediaEntry>,
}

impl CatalogView {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, full_path: &Path) -> bool {
        self.entries.contains_key(full_path)
    }

    pub fn get(&self, full_path: &Path) -> Option<&MediaEntry> {
        self.entries.get(full_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &MediaEntry)> {
        self.order.iter().filter_map(|path| {
            self.entries
                .get(path)
                .map(|entry| (path.as_path(), entry))
        })
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.order.iter().map(PathBuf::as_path)
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }

    /// Inserts or replaces the snapshot for `full_path`. A replaced entry keeps
    /// its position.
    pub(crate) fn insert(&mut self, full_path: PathBuf, entry: MediaEntry) {
        if self.entries.insert(full_path.clone(), entry).is_none() {
            self.order.push(full_path);
        }
    }

    pub(crate) fn remove(&mut self, full_path: &Path) -> Option<MediaEntry> {
        let removed = self.entries.remove(full_path)?;
        self.order.retain(|path| path != full_path);
        Some(removed)
    }

    pub(crate) fn entry_by_id_mut(&mut self, media_id: i64) -> Option<&mut MediaEntry> {
        self.entries
            .values_mut()
            .find(|entry| entry.media_id == media_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(media_id: i64, relative_path: &str) -> MediaEntry {
        MediaEntry {
            media_id,
            mount_alias: "movies".to_string(),
            relative_path: relative_path.to_string(),
            modified_time: 0,
            times_played: 0,
        }
    }

    #[test]
    fn test_iteration_follows_insertion_order() {
        let mut view = CatalogView::default();
        view.insert(PathBuf::from("/m/b"), entry(2, "b"));
        view.insert(PathBuf::from("/m/a"), entry(1, "a"));
        view.insert(PathBuf::from("/m/c"), entry(3, "c"));

        let paths: Vec<_> = view.paths().collect();
        assert_eq!(
            paths,
            vec![Path::new("/m/b"), Path::new("/m/a"), Path::new("/m/c")]
        );
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut view = CatalogView::default();
        view.insert(PathBuf::from("/m/a"), entry(1, "a"));
        view.insert(PathBuf::from("/m/b"), entry(2, "b"));

        let mut played = entry(1, "a");
        played.times_played = 4;
        view.insert(PathBuf::from("/m/a"), played);

        assert_eq!(view.len(), 2);
        let (first_path, first) = view.iter().next().unwrap();
        assert_eq!(first_path, Path::new("/m/a"));
        assert_eq!(first.times_played, 4);
    }

    #[test]
    fn test_remove_and_lookup_by_id() {
        let mut view = CatalogView::default();
        view.insert(PathBuf::from("/m/a"), entry(1, "a"));
        view.insert(PathBuf::from("/m/b"), entry(2, "b"));

        assert_eq!(view.remove(Path::new("/m/a")).map(|e| e.media_id), Some(1));
        assert!(view.remove(Path::new("/m/a")).is_none());
        assert!(!view.contains(Path::new("/m/a")));
        assert_eq!(view.len(), 1);

        view.entry_by_id_mut(2).unwrap().times_played += 1;
        assert_eq!(view.get(Path::new("/m/b")).unwrap().times_played, 1);
    }
}
