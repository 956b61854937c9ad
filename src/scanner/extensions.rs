use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::Path;

/// Case-insensitive allow-list of media file extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaExtensions(BTreeSet<String>);

impl MediaExtensions {
    /// Accepts `mp4`, `.MP4` and the like.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Whether the last dot-separated segment of the file name is allowed.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .map(|ext| self.0.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }
}

/// Names starting with `.` are never cataloged nor probed.
pub fn is_hidden(name: &OsStr) -> bool {
    name.as_encoded_bytes().first() == Some(&b'.')
}
