use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub local_database: Option<String>,
    pub media_extensions: Option<Vec<String>>,
    pub local_scan_delay_secs: Option<u64>,

    // Catalog behavior
    pub non_media_tag: Option<String>,
    pub default_exclusion_tags: Option<Vec<String>>,
    pub quick_tags: Option<BTreeMap<String, String>>,

    /// Alias to root directory, in the order sources are scanned.
    pub media_sources: Option<toml::Table>,

    pub s3_database: Option<S3DatabaseConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct S3DatabaseConfig {
    pub bucket: Option<String>,
    /// Object key of the catalog file.
    pub filename: Option<String>,
    /// Named AWS credentials profile.
    pub profile: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
local_database = "/var/lib/allplay/allplay.db"
media_extensions = ["mp4", "mkv"]
non_media_tag = "not-media"
default_exclusion_tags = ["seen"]
local_scan_delay_secs = 600

[media_sources]
tv = "/srv/tv"
movies = "/srv/movies"
anime = "/srv/anime"

[quick_tags]
s = "seen"

[s3_database]
bucket = "backups"
filename = "allplay.db"
profile = "home"
"#,
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap();

        assert_eq!(
            config.local_database.as_deref(),
            Some("/var/lib/allplay/allplay.db")
        );
        assert_eq!(config.local_scan_delay_secs, Some(600));
        let aliases: Vec<&String> = config.media_sources.as_ref().unwrap().keys().collect();
        assert_eq!(aliases, vec!["tv", "movies", "anime"]);
        assert_eq!(
            config.quick_tags.unwrap().get("s").map(String::as_str),
            Some("seen")
        );
        assert_eq!(config.s3_database.unwrap().profile.as_deref(), Some("home"));
    }

    #[test]
    fn test_load_empty_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert!(config.media_sources.is_none());
        assert!(config.s3_database.is_none());
    }

    #[test]
    fn test_load_reports_bad_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "media_extensions = 3").unwrap();

        let err = FileConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }
}
