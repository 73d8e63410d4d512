use std::fmt;
use std::path::PathBuf;

use rusqlite::ffi;
use rusqlite::types::Type;
use rusqlite::{ErrorCode, Row, Statement};
use thiserror::Error;

use crate::models::ValidationError;

/// Every failure the repository reports. Lookups that find nothing are not
/// errors; they come back as `None` or `false`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] rusqlite::Error),
    #[error("Could not prepare data directory {}: {source}", path.display())]
    DataDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{entity} '{key}' already exists.")]
    DuplicateKey { entity: &'static str, key: String },
    #[error("{entity} {id} does not exist.")]
    ForeignKeyViolation { entity: &'static str, id: String },
    #[error("Category '{category}' cannot be nested beneath itself or one of its subcategories.")]
    CategoryCycle { category: String },
    #[error("{entity} '{key}' is still used by {dependents}.")]
    InUse {
        entity: &'static str,
        key: String,
        dependents: String,
    },
    #[error("Stored {column} value '{value}' could not be decoded.")]
    Corrupt { column: String, value: String },
    #[error(transparent)]
    InvalidInput(#[from] ValidationError),
}

impl StoreError {
    pub(crate) fn duplicate(entity: &'static str, key: impl ToString) -> Self {
        StoreError::DuplicateKey {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn missing(entity: &'static str, id: impl ToString) -> Self {
        StoreError::ForeignKeyViolation {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::FromSqlConversionFailure(idx, _, source) => {
                match source.downcast::<Undecodable>() {
                    Ok(bad) => {
                        let Undecodable { column, value, .. } = *bad;
                        StoreError::Corrupt { column, value }
                    }
                    Err(source) => StoreError::Corrupt {
                        column: idx.to_string(),
                        value: source.to_string(),
                    },
                }
            }
            rusqlite::Error::InvalidColumnType(_, column, ty) => StoreError::Corrupt {
                column,
                value: format!("<{ty}>"),
            },
            other => StoreError::StorageUnavailable(other),
        }
    }
}

/// Which kind of constraint SQLite rejected a write with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Constraint {
    Unique,
    ForeignKey,
    Other,
}

/// Inspect a SQLite failure for a constraint violation. Unique and primary key
/// violations collapse into `Unique` since callers report both as duplicates.
pub(crate) fn constraint_violation(err: &rusqlite::Error) -> Option<Constraint> {
    let inner = err.sqlite_error()?;
    if inner.code != ErrorCode::ConstraintViolation {
        return None;
    }
    Some(match inner.extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => Constraint::Unique,
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Constraint::ForeignKey,
        _ => Constraint::Other,
    })
}

/// A stored value one of the column codecs could not parse. Travels inside
/// rusqlite's conversion error until `From` turns it into `Corrupt`.
#[derive(Debug, Error)]
#[error("column {column} holds {value:?}: {reason}")]
pub(crate) struct Undecodable {
    column: String,
    value: String,
    reason: String,
}

pub(crate) fn column_name(row: &Row<'_>, idx: usize) -> String {
    let stmt: &Statement<'_> = row.as_ref();
    stmt.column_name(idx)
        .map_or_else(|_| idx.to_string(), str::to_string)
}

/// Wrap a parse failure for column `idx` the way rusqlite reports its own
/// conversion errors, keeping the column name and the raw value.
pub(crate) fn conversion_failure(
    row: &Row<'_>,
    idx: usize,
    value: &str,
    reason: impl fmt::Display,
) -> rusqlite::Error {
    let bad = Undecodable {
        column: column_name(row, idx),
        value: value.to_string(),
        reason: reason.to_string(),
    };
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(bad))
}
