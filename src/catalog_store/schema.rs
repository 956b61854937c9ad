//! SQLite schema for the media catalog.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const MEDIA_ID_FK: ForeignKey = ForeignKey {
    foreign_table: "media",
    foreign_column: "media_id",
    on_delete: ForeignKeyOnChange::NoAction,
};

const TAG_ID_FK: ForeignKey = ForeignKey {
    foreign_table: "tag",
    foreign_column: "tag_id",
    on_delete: ForeignKeyOnChange::NoAction,
};

/// One row per cataloged top-level entry of a media source.
const MEDIA_TABLE: Table = Table {
    name: "media",
    columns: &[
        sqlite_column!("media_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("mount_alias", &SqlType::Text, non_null = true),
        sqlite_column!("relative_path", &SqlType::Text, non_null = true),
        sqlite_column!(
            "modified_time",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "times_played",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    composite_primary_key: None,
    indices: &[("idx_media_mount_alias", "mount_alias")],
    unique_constraints: &[&["mount_alias", "relative_path"]],
};

const TAG_TABLE: Table = Table {
    name: "tag",
    columns: &[
        sqlite_column!("tag_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
    ],
    composite_primary_key: None,
    indices: &[],
    unique_constraints: &[&["name"]],
};

const MEDIA_TAG_TABLE: Table = Table {
    name: "media_tag",
    columns: &[
        sqlite_column!(
            "tag_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&TAG_ID_FK)
        ),
        sqlite_column!(
            "media_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&MEDIA_ID_FK)
        ),
    ],
    composite_primary_key: Some(&["tag_id", "media_id"]),
    indices: &[("idx_media_tag_media_id", "media_id")],
    unique_constraints: &[],
};

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[MEDIA_TABLE, TAG_TABLE, MEDIA_TAG_TABLE],
    migration: None,
}];

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_catalog_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = &CATALOG_VERSIONED_SCHEMAS[CATALOG_VERSIONED_SCHEMAS.len() - 1];

        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();
    }

    #[test]
    fn test_media_tag_requires_both_endpoints() {
        let conn = Connection::open_in_memory().unwrap();
        CATALOG_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
        conn.execute(
            "INSERT INTO media (mount_alias, relative_path) VALUES ('movies', 'Trip')",
            [],
        )
        .unwrap();

        // media exists, tag does not
        assert!(conn
            .execute("INSERT INTO media_tag (tag_id, media_id) VALUES (1, 1)", [])
            .is_err());

        conn.execute("INSERT INTO tag (name) VALUES ('seen')", [])
            .unwrap();
        conn.execute("INSERT INTO media_tag (tag_id, media_id) VALUES (1, 1)", [])
            .unwrap();

        // association still references the media row
        assert!(conn.execute("DELETE FROM media WHERE media_id = 1", []).is_err());
    }

    #[test]
    fn test_media_defaults() {
        let conn = Connection::open_in_memory().unwrap();
        CATALOG_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
        conn.execute(
            "INSERT INTO media (mount_alias, relative_path) VALUES ('movies', 'Trip')",
            [],
        )
        .unwrap();

        let (modified_time, times_played): (i64, i64) = conn
            .query_row(
                "SELECT modified_time, times_played FROM media WHERE relative_path = 'Trip'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert!(modified_time > 0);
        assert_eq!(times_played, 0);
    }
}
