mod file_config;

pub use file_config::{FileConfig, S3DatabaseConfig};

use crate::catalog_store::MediaSources;
use crate::remote_sync::S3Location;
use crate::scanner::MediaExtensions;
use crate::session::SessionSettings;
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] =
    &["mp4", "mkv", "avi", "m4v", "webm", "mp3", "flac", "ogg"];
pub const DEFAULT_NON_MEDIA_TAG: &str = "non_media";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub local_database: Option<PathBuf>,
    pub media_sources: Vec<(String, PathBuf)>,
    pub media_extensions: Vec<String>,
    pub local_scan_delay_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub local_database: PathBuf,
    pub media_sources: MediaSources,
    pub media_extensions: MediaExtensions,
    pub non_media_tag: String,
    pub default_exclusion_tags: Vec<String>,
    pub quick_tags: BTreeMap<String, String>,
    pub local_scan_delay: Duration,

    /// `None` runs local-only.
    pub remote: Option<S3Location>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let local_database = match file.local_database {
            Some(path) => resolve_path(&path)?,
            None => cli
                .local_database
                .clone()
                .unwrap_or_else(default_local_database),
        };

        let media_sources = match file.media_sources {
            Some(table) => {
                let mut sources = MediaSources::new();
                for (alias, root) in table {
                    let Some(root) = root.as_str() else {
                        bail!("media_sources.{} must be a path string", alias);
                    };
                    sources.insert(alias, resolve_path(root)?);
                }
                sources
            }
            None => {
                let mut sources = MediaSources::new();
                for (alias, root) in &cli.media_sources {
                    sources.insert(alias.clone(), root.clone());
                }
                sources
            }
        };
        if media_sources.is_empty() {
            bail!("At least one media source must be specified via --source or [media_sources]");
        }

        let media_extensions = match file.media_extensions {
            Some(extensions) => MediaExtensions::new(extensions),
            None if !cli.media_extensions.is_empty() => MediaExtensions::new(&cli.media_extensions),
            None => MediaExtensions::new(DEFAULT_MEDIA_EXTENSIONS),
        };
        if media_extensions.is_empty() {
            bail!("media_extensions must not be empty");
        }

        let non_media_tag = file
            .non_media_tag
            .map(|tag| tag.trim().to_string())
            .unwrap_or_else(|| DEFAULT_NON_MEDIA_TAG.to_string());
        if non_media_tag.is_empty() {
            bail!("non_media_tag must not be empty");
        }
        let default_exclusion_tags = file
            .default_exclusion_tags
            .unwrap_or_else(|| vec![non_media_tag.clone()]);

        let local_scan_delay = Duration::from_secs(
            file.local_scan_delay_secs
                .or(cli.local_scan_delay_secs)
                .unwrap_or(0),
        );

        let remote = file.s3_database.and_then(|s3| {
            let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
            Some(S3Location {
                bucket: non_empty(s3.bucket)?,
                key: non_empty(s3.filename)?,
                profile: non_empty(s3.profile)?,
            })
        });

        Ok(Self {
            local_database,
            media_sources,
            media_extensions,
            non_media_tag,
            default_exclusion_tags,
            quick_tags: file.quick_tags.unwrap_or_default(),
            local_scan_delay,
            remote,
        })
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            database_path: self.local_database.clone(),
            sources: self.media_sources.clone(),
            extensions: self.media_extensions.clone(),
            non_media_tag: self.non_media_tag.clone(),
            local_scan_delay: self.local_scan_delay,
        }
    }

    /// Maps a quick tag shortcut to its full name; other names pass through.
    pub fn expand_tag<'a>(&'a self, name: &'a str) -> &'a str {
        self.quick_tags
            .get(name.trim())
            .map(String::as_str)
            .unwrap_or(name)
    }
}

fn default_local_database() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".allplay").join("allplay.db"))
        .unwrap_or_else(|| PathBuf::from("allplay.db"))
}

/// Expands a leading `~`, then canonicalizes when the path exists and makes
/// it absolute otherwise.
pub fn resolve_path(s: &str) -> Result<PathBuf> {
    let path_buf = match s.strip_prefix("~") {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            let home = dirs::home_dir().context("Cannot expand ~, no home directory")?;
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(s),
    };
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(err).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

/// Like [`resolve_path`], but keeps the last component as given so that a
/// symlinked catalog entry is not replaced by its target.
pub fn resolve_entry_path(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            let parent = parent
                .to_str()
                .context("Path is not valid UTF-8")?;
            Ok(resolve_path(parent)?.join(name))
        }
        (_, Some(name)) => Ok(resolve_path(".")?.join(name)),
        _ => resolve_path(s),
    }
}
