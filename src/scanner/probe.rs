use super::extensions::{is_hidden, MediaExtensions};
use super::ScanError;
use crate::interrupt::InterruptFlag;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Depth-first search for at least one media file below `dir`.
///
/// Hidden names are not traversed and unreadable subdirectories are skipped.
/// Symlinks are followed. Each directory is visited once by its canonical
/// path, so symlink loops terminate.
pub fn contains_media(
    dir: &Path,
    extensions: &MediaExtensions,
    interrupt: &InterruptFlag,
) -> Result<bool, ScanError> {
    let mut pending: Vec<PathBuf> = vec![dir.to_path_buf()];
    let mut visited: HashSet<PathBuf> = HashSet::new();

    while let Some(current) = pending.pop() {
        interrupt.check()?;

        let canonical = match fs::canonicalize(&current) {
            Ok(canonical) => canonical,
            Err(err) => {
                debug!("Skipping unresolvable directory {:?}: {}", current, err);
                continue;
            }
        };
        if !visited.insert(canonical) {
            continue;
        }

        let read_dir = match fs::read_dir(&current) {
            Ok(read_dir) => read_dir,
            Err(err) => {
                debug!("Skipping unreadable directory {:?}: {}", current, err);
                continue;
            }
        };

        for dir_entry in read_dir {
            let dir_entry = match dir_entry {
                Ok(dir_entry) => dir_entry,
                Err(err) => {
                    debug!("Skipping unreadable entry in {:?}: {}", current, err);
                    continue;
                }
            };
            if is_hidden(&dir_entry.file_name()) {
                continue;
            }
            let path = dir_entry.path();
            // Follows symlinks, broken ones fail here
            let Ok(metadata) = fs::metadata(&path) else {
                continue;
            };

            if metadata.is_dir() {
                pending.push(path);
            } else if metadata.is_file() && extensions.matches(&path) {
                debug!("Found media file {:?}", path);
                return Ok(true);
            }
        }
    }
    Ok(false)
}
