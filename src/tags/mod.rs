//! Tag operations bound to a single media entry.

use crate::catalog_store::{CatalogError, CatalogResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Tag set of one media entry. Borrows the catalog connection, so it cannot
/// outlive the store that handed it out.
pub struct TagManager<'conn> {
    conn: &'conn Connection,
    media_id: i64,
}

impl<'conn> TagManager<'conn> {
    pub fn new(conn: &'conn Connection, media_id: i64) -> Self {
        Self { conn, media_id }
    }

    pub fn media_id(&self) -> i64 {
        self.media_id
    }

    pub fn list(&self) -> CatalogResult<BTreeSet<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT t.name FROM tag t JOIN media_tag mt ON mt.tag_id = t.tag_id WHERE mt.media_id = ?1",
        )?;
        let names = stmt
            .query_map(params![self.media_id], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(names)
    }

    pub fn contains(&self, name: &str) -> CatalogResult<bool> {
        let name = validate_tag_name(name)?;
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM media_tag mt JOIN tag t ON t.tag_id = mt.tag_id WHERE mt.media_id = ?1 AND t.name = ?2",
                params![self.media_id, name],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    /// Associates `name` with this entry, creating the tag on first use.
    /// Returns `false` when it was already associated.
    pub fn add(&self, name: &str) -> CatalogResult<bool> {
        let name = validate_tag_name(name)?;
        if self.contains(name)? {
            debug!("Media {} already tagged {:?}", self.media_id, name);
            return Ok(false);
        }

        let tx = self.conn.unchecked_transaction()?;
        if ensure_tag(&tx, name)? {
            debug!("Created tag {:?}", name);
        }
        let affected = tx.execute(
            "INSERT INTO media_tag (tag_id, media_id) SELECT tag_id, ?2 FROM tag WHERE name = ?1",
            params![name, self.media_id],
        )?;
        CatalogError::expect_rows("tag association insert", 1, affected)?;
        tx.commit()?;

        info!("Tagged media {} with {:?}", self.media_id, name);
        Ok(true)
    }

    /// Removes the association. The tag row is deleted too once nothing else
    /// carries it; the return value tells whether that happened.
    pub fn remove(&self, name: &str) -> CatalogResult<bool> {
        let name = validate_tag_name(name)?;

        let tx = self.conn.unchecked_transaction()?;
        let affected = tx.execute(
            "DELETE FROM media_tag WHERE media_id = ?1 AND tag_id IN (SELECT tag_id FROM tag WHERE name = ?2)",
            params![self.media_id, name],
        )?;
        if affected == 0 {
            return Err(CatalogError::NotFound(format!(
                "tag {:?} on media {}",
                name, self.media_id
            )));
        }
        CatalogError::expect_rows("tag association delete", 1, affected)?;

        let collected = tx.execute(
            "DELETE FROM tag WHERE name = ?1 AND NOT EXISTS (SELECT 1 FROM media_tag mt WHERE mt.tag_id = tag.tag_id)",
            params![name],
        )? == 1;
        tx.commit()?;

        info!("Removed tag {:?} from media {}", name, self.media_id);
        if collected {
            info!("Tag {:?} no longer used, deleted", name);
        }
        Ok(collected)
    }
}

/// Trims `name` and rejects empty names.
pub fn validate_tag_name(name: &str) -> CatalogResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::InvalidTagName(name.to_string()));
    }
    Ok(trimmed)
}

/// Creates the tag row unless it exists. Returns whether it was created.
pub(crate) fn ensure_tag(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let inserted = conn.execute("INSERT OR IGNORE INTO tag (name) VALUES (?1)", params![name])?;
    Ok(inserted == 1)
}

/// Drops tags that no association references anymore. Returns how many went.
pub(crate) fn collect_orphan_tags(conn: &Connection, tag_ids: &[i64]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached(
        "DELETE FROM tag WHERE tag_id = ?1 AND NOT EXISTS (SELECT 1 FROM media_tag WHERE tag_id = ?1)",
    )?;
    let mut collected = 0;
    for tag_id in tag_ids {
        collected += stmt.execute(params![tag_id])?;
    }
    Ok(collected)
}
