use crate::interrupt::Interrupted;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by catalog and tag operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Refusing to delete {path:?}: {reason}")]
    ProtectedPath { path: PathBuf, reason: &'static str },

    #[error("{operation} affected {affected} rows, expected {expected}")]
    IntegrityViolation {
        operation: &'static str,
        expected: usize,
        affected: usize,
    },

    #[error("Invalid tag name: {0:?}")]
    InvalidTagName(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    pub(crate) fn expect_rows(
        operation: &'static str,
        expected: usize,
        affected: usize,
    ) -> CatalogResult<()> {
        if affected == expected {
            Ok(())
        } else {
            Err(CatalogError::IntegrityViolation {
                operation,
                expected,
                affected,
            })
        }
    }
}
