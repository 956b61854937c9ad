#![allow(dead_code)]

pub const TV_ALIAS: &str = "tv";
pub const MOVIES_ALIAS: &str = "movies";

/// Directory holding a clip plus a thumbs subdirectory.
pub const TRIP_DIR: &str = "Trip";
/// Directory without any media file.
pub const NOTES_DIR: &str = "Notes";
pub const PILOT_FILE: &str = "pilot.mkv";
pub const FEATURE_FILE: &str = "feature.mp4";

pub const NON_MEDIA_TAG: &str = "non_media";
pub const TEST_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi"];

/// Entries a full scan of a fresh library catalogs.
pub const CATALOGED_ENTRIES: usize = 4;
