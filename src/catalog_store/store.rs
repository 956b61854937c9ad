//! SQLite-backed media catalog.

use super::error::{CatalogError, CatalogResult};
use super::filter::CatalogFilter;
use super::models::{MediaEntry, MergeReport, ScanBatch, StagedKind};
use super::mounts::{normalize_path, MediaSources};
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::view::CatalogView;
use crate::sqlite_persistence::BASE_DB_VERSION;
use crate::tags::{self, TagManager};
use anyhow::{bail, Context, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

fn ensure_schema(conn: &mut Connection) -> Result<()> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    let latest_version = CATALOG_VERSIONED_SCHEMAS.len() - 1;
    let latest_schema = &CATALOG_VERSIONED_SCHEMAS[latest_version];

    if db_version == 0 {
        // Fresh file, or a catalog written before versioning: create what is
        // missing and let validation reject anything incompatible.
        info!("Creating catalog db schema at version {}", latest_version);
        latest_schema.create(conn)?;
    } else if db_version < BASE_DB_VERSION as i64 {
        bail!(
            "Database has user_version {}, it is not an allplay catalog",
            db_version
        );
    } else {
        let mut current_version = (db_version - BASE_DB_VERSION as i64) as usize;
        if current_version > latest_version {
            bail!(
                "Catalog db version {} is newer than the supported version {}",
                current_version,
                latest_version
            );
        }
        if current_version < latest_version {
            let tx = conn.transaction()?;
            for schema in CATALOG_VERSIONED_SCHEMAS.iter().skip(current_version + 1) {
                if let Some(migration_fn) = schema.migration {
                    info!(
                        "Migrating catalog db from version {} to {}",
                        current_version, schema.version
                    );
                    migration_fn(&tx)?;
                }
                current_version = schema.version;
            }
            tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
            tx.commit()?;
            latest_schema.create(conn)?;
        }
    }

    latest_schema
        .validate(conn)
        .context("Catalog db schema validation failed")?;
    Ok(())
}

fn entry_from_row(row: &Row) -> rusqlite::Result<MediaEntry> {
    Ok(MediaEntry {
        media_id: row.get(0)?,
        mount_alias: row.get(1)?,
        relative_path: row.get(2)?,
        modified_time: row.get(3)?,
        times_played: row.get(4)?,
    })
}

fn fetch_entry(
    conn: &Connection,
    mount_alias: &str,
    relative_path: &str,
) -> rusqlite::Result<Option<MediaEntry>> {
    conn.query_row(
        "SELECT media_id, mount_alias, relative_path, modified_time, times_played FROM media WHERE mount_alias = ?1 AND relative_path = ?2",
        params![mount_alias, relative_path],
        entry_from_row,
    )
    .optional()
}

/// The durable catalog plus its in-memory view.
///
/// Owns the only connection to the catalog file for the lifetime of a
/// session. All mutations go through here or through a [`TagManager`]
/// borrowed from it.
pub struct CatalogStore {
    conn: Connection,
    db_path: Option<PathBuf>,
    sources: MediaSources,
    non_media_tag: String,
    view: CatalogView,
}

impl CatalogStore {
    /// Opens (or creates) the catalog file and makes sure the schema is in
    /// place. The view starts empty; call [`CatalogStore::load`] to fill it.
    pub fn open<P: AsRef<Path>>(
        db_path: P,
        sources: MediaSources,
        non_media_tag: impl Into<String>,
    ) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open catalog database {:?}", db_path))?;
        let store = Self::from_connection(conn, sources, non_media_tag.into())?;

        info!(
            "Opened catalog {:?}: {} media entries, {} tags",
            db_path,
            store.media_count()?,
            store.tag_names()?.len()
        );
        Ok(Self {
            db_path: Some(db_path.to_path_buf()),
            ..store
        })
    }

    pub fn open_in_memory(sources: MediaSources, non_media_tag: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, sources, non_media_tag.into())
    }

    fn from_connection(
        mut conn: Connection,
        sources: MediaSources,
        non_media_tag: String,
    ) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        ensure_schema(&mut conn)?;
        Ok(Self {
            conn,
            db_path: None,
            sources,
            non_media_tag,
            view: CatalogView::default(),
        })
    }

    /// Closes the connection, flushing everything to the file.
    pub fn close(self) -> CatalogResult<()> {
        self.conn.close().map_err(|(_, err)| CatalogError::from(err))
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn sources(&self) -> &MediaSources {
        &self.sources
    }

    pub fn non_media_tag(&self) -> &str {
        &self.non_media_tag
    }

    pub fn view(&self) -> &CatalogView {
        &self.view
    }

    pub fn entry(&self, full_path: &Path) -> Option<&MediaEntry> {
        self.view
            .get(full_path)
            .or_else(|| self.view.get(&normalize_path(full_path)))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Path, &MediaEntry)> {
        self.view.iter()
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Tag operations for one entry.
    pub fn tags(&self, media_id: i64) -> TagManager<'_> {
        TagManager::new(&self.conn, media_id)
    }

    pub fn tag_names(&self) -> CatalogResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM tag ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn media_count(&self) -> CatalogResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM media", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    /// Replaces the view with the rows matching `filter` (everything when
    /// `None`).
    pub fn load(&mut self, filter: Option<&CatalogFilter>) -> CatalogResult<&CatalogView> {
        self.view.clear();

        let default_filter = CatalogFilter::default();
        let (sql, params) = filter.unwrap_or(&default_filter).to_sql();
        debug!("Loading catalog: {} {:?}", sql, params);

        let rows = {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        for entry in rows {
            match self.sources.full_path(&entry.mount_alias, &entry.relative_path) {
                Some(full_path) => self.view.insert(full_path, entry),
                None => warn!(
                    "Skipping {}/{}: mount alias is not configured",
                    entry.mount_alias, entry.relative_path
                ),
            }
        }
        debug!("Loaded {} catalog entries", self.view.len());
        Ok(&self.view)
    }

    /// Inserts staged entries unless their `(mount_alias, relative_path)`
    /// already exists. Non-media entries get the sentinel tag in the same
    /// transaction.
    pub fn merge(&mut self, batch: &ScanBatch) -> CatalogResult<MergeReport> {
        let mut report = MergeReport::default();
        if batch.is_empty() {
            return Ok(report);
        }

        let tx = self.conn.transaction()?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT OR IGNORE INTO media (mount_alias, relative_path, modified_time, times_played) VALUES (?1, ?2, ?3, 0)",
            )?;
            for (full_path, staged) in batch.iter() {
                let inserted = insert.execute(params![
                    staged.mount_alias,
                    staged.relative_path,
                    staged.modified_time
                ])?;
                if inserted == 0 {
                    debug!("Already cataloged: {:?}", full_path);
                    report.already_present += 1;
                    continue;
                }
                report.inserted += 1;

                if staged.kind == StagedKind::NonMedia {
                    let media_id = tx.last_insert_rowid();
                    tags::ensure_tag(&tx, &self.non_media_tag)?;
                    let associated = tx.execute(
                        "INSERT OR IGNORE INTO media_tag (tag_id, media_id) SELECT tag_id, ?2 FROM tag WHERE name = ?1",
                        params![self.non_media_tag, media_id],
                    )?;
                    CatalogError::expect_rows("sentinel tag insert", 1, associated)?;
                    report.sentinel_tagged += 1;
                }
            }
        }
        tx.commit()?;

        for (full_path, staged) in batch.iter() {
            if let Some(entry) = fetch_entry(&self.conn, &staged.mount_alias, &staged.relative_path)? {
                self.view.insert(full_path.to_path_buf(), entry);
            }
        }

        info!(
            "Merged {} staged entries: {} new ({} non-media), {} already cataloged",
            batch.len(),
            report.inserted,
            report.sentinel_tagged,
            report.already_present
        );
        Ok(report)
    }

    /// Removes an entry with all its tag associations. Tags left unused are
    /// deleted as well.
    pub fn delete(&mut self, full_path: &Path) -> CatalogResult<MediaEntry> {
        if let Some(reason) = self.sources.protection_reason(full_path) {
            warn!("Refusing to delete {:?}: {}", full_path, reason);
            return Err(CatalogError::ProtectedPath {
                path: full_path.to_path_buf(),
                reason,
            });
        }

        let (view_key, entry) = self.lookup(full_path)?;

        let tx = self.conn.transaction()?;
        let tag_ids = {
            let mut stmt = tx.prepare("SELECT tag_id FROM media_tag WHERE media_id = ?1")?;
            let tag_ids = stmt
                .query_map(params![entry.media_id], |r| r.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            tag_ids
        };
        tx.execute(
            "DELETE FROM media_tag WHERE media_id = ?1",
            params![entry.media_id],
        )?;
        let removed = tx.execute(
            "DELETE FROM media WHERE media_id = ?1",
            params![entry.media_id],
        )?;
        CatalogError::expect_rows("media delete", 1, removed)?;
        let collected = tags::collect_orphan_tags(&tx, &tag_ids)?;
        tx.commit()?;

        self.view.remove(&view_key);
        info!(
            "Deleted {:?} from catalog ({} unused tags removed)",
            view_key, collected
        );
        Ok(entry)
    }

    /// Points an entry at another source, keeping its id, tags and play count.
    /// Returns the new full path.
    pub fn relocate(&mut self, full_path: &Path, new_alias: &str) -> CatalogResult<PathBuf> {
        let (view_key, entry) = self.lookup(full_path)?;
        let new_path = self
            .sources
            .full_path(new_alias, &entry.relative_path)
            .ok_or_else(|| CatalogError::NotFound(format!("media source {:?}", new_alias)))?;

        let affected = self.conn.execute(
            "UPDATE media SET mount_alias = ?1 WHERE media_id = ?2",
            params![new_alias, entry.media_id],
        )?;
        CatalogError::expect_rows("media relocate", 1, affected)?;

        self.view.remove(&view_key);
        self.view.insert(
            new_path.clone(),
            MediaEntry {
                mount_alias: new_alias.to_string(),
                ..entry
            },
        );
        info!("Moved {:?} to {:?}", view_key, new_path);
        Ok(new_path)
    }

    pub fn increment_play_count(&mut self, media_id: i64) -> CatalogResult<()> {
        let affected = self.conn.execute(
            "UPDATE media SET times_played = times_played + 1 WHERE media_id = ?1",
            params![media_id],
        )?;
        CatalogError::expect_rows("play count update", 1, affected)?;

        if let Some(entry) = self.view.entry_by_id_mut(media_id) {
            entry.times_played += 1;
        }
        Ok(())
    }

    /// View entries carrying none of `tags`, in view order.
    pub fn entries_excluding(&self, tags: &[String]) -> CatalogResult<Vec<(PathBuf, MediaEntry)>> {
        let excluded: HashSet<i64> = if tags.is_empty() {
            HashSet::new()
        } else {
            let placeholders = vec!["?"; tags.len()].join(", ");
            let mut stmt = self.conn.prepare(&format!(
                "SELECT DISTINCT mt.media_id FROM media_tag mt JOIN tag t ON t.tag_id = mt.tag_id WHERE t.name IN ({})",
                placeholders
            ))?;
            let ids = stmt
                .query_map(params_from_iter(tags.iter()), |r| r.get(0))?
                .collect::<Result<HashSet<i64>, _>>()?;
            ids
        };

        Ok(self
            .view
            .iter()
            .filter(|(_, entry)| !excluded.contains(&entry.media_id))
            .map(|(path, entry)| (path.to_path_buf(), entry.clone()))
            .collect())
    }

    /// Finds an entry by full path: the view first, then the table through
    /// the configured sources.
    fn lookup(&self, full_path: &Path) -> CatalogResult<(PathBuf, MediaEntry)> {
        if let Some(entry) = self.view.get(full_path) {
            return Ok((full_path.to_path_buf(), entry.clone()));
        }
        let normalized = normalize_path(full_path);
        if let Some(entry) = self.view.get(&normalized) {
            return Ok((normalized, entry.clone()));
        }

        let not_found = || CatalogError::NotFound(format!("{:?}", full_path));
        let (alias, relative_path) = self.sources.locate(full_path).ok_or_else(not_found)?;
        let entry = fetch_entry(&self.conn, alias, &relative_path)?.ok_or_else(not_found)?;
        let view_key = self
            .sources
            .full_path(alias, &relative_path)
            .unwrap_or(normalized);
        Ok((view_key, entry))
    }
}
