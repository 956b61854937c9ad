use chrono::{DateTime, TimeDelta, Utc};
use std::fs;
use std::io;
use std::path::Path;

/// Forward tolerance for clock differences between this host and the remote.
pub const GRACE_SKEW: TimeDelta = TimeDelta::minutes(1);

/// Pull iff the local copy is absent or the remote is newer than
/// local + [`GRACE_SKEW`].
pub fn should_pull(local: Option<DateTime<Utc>>, remote: DateTime<Utc>) -> bool {
    match local {
        None => true,
        Some(local) => remote > local + GRACE_SKEW,
    }
}

/// Push iff the local copy is strictly newer. No skew on this side.
pub fn should_push(local: DateTime<Utc>, remote: DateTime<Utc>) -> bool {
    local > remote
}

/// Modification time of a regular file, `None` when there is no such file.
pub fn local_modified(path: &Path) -> io::Result<Option<DateTime<Utc>>> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(Some(metadata.modified()?.into())),
        Ok(_) => Ok(None),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}
