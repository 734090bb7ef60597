use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::schema::EntityKind;

/// Rows in one dependent table that keep a restricted delete from going ahead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Blocker {
    pub table: &'static str,
    pub column: &'static str,
    pub rows: i64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} with {field} {value:?} already exists")]
    UniquenessViolation {
        entity: EntityKind,
        field: &'static str,
        value: String,
    },
    #[error("{entity}.{field} references missing row {id:?}")]
    ReferenceError {
        entity: EntityKind,
        field: &'static str,
        id: Option<i64>,
    },
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: i64 },
    #[error("{entity} {id} is still referenced by other rows")]
    ReferencedEntityError {
        entity: EntityKind,
        id: i64,
        blockers: Vec<Blocker>,
    },
    #[error("invalid {field}: {message}")]
    InvalidField { field: String, message: String },
    #[error("storage unavailable: {0:#}")]
    StorageUnavailable(anyhow::Error),
    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine code reported to sidecar clients.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::UniquenessViolation { .. } => "uniqueness_violation",
            StoreError::ReferenceError { .. } => "reference_error",
            StoreError::NotFound { .. } => "not_found",
            StoreError::ReferencedEntityError { .. } => "referenced_entity",
            StoreError::InvalidField { .. } => "bad_params",
            StoreError::StorageUnavailable(_) => "storage_unavailable",
            StoreError::Storage(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            StoreError::UniquenessViolation {
                entity,
                field,
                value,
            } => Some(json!({ "entity": entity, "field": field, "value": value })),
            StoreError::ReferenceError { entity, field, id } => {
                Some(json!({ "entity": entity, "field": field, "id": id }))
            }
            StoreError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            StoreError::ReferencedEntityError {
                entity,
                id,
                blockers,
            } => Some(json!({ "entity": entity, "id": id, "blockers": blockers })),
            StoreError::InvalidField { field, .. } => Some(json!({ "field": field })),
            StoreError::StorageUnavailable(_) | StoreError::Storage(_) => None,
        }
    }

    /// Maps a constraint failure raised by SQLite itself back onto the
    /// matching domain error. Anything else stays a storage error.
    pub(crate) fn from_constraint(
        e: rusqlite::Error,
        entity: EntityKind,
        unique_field: Option<(&'static str, &str)>,
    ) -> Self {
        use rusqlite::ffi::{SQLITE_CONSTRAINT_FOREIGNKEY, SQLITE_CONSTRAINT_UNIQUE};
        if let rusqlite::Error::SqliteFailure(f, _) = &e {
            if f.extended_code == SQLITE_CONSTRAINT_UNIQUE {
                let (field, value) = unique_field.unwrap_or(("id", ""));
                return StoreError::UniquenessViolation {
                    entity,
                    field,
                    value: value.to_string(),
                };
            }
            if f.extended_code == SQLITE_CONSTRAINT_FOREIGNKEY {
                return StoreError::ReferenceError {
                    entity,
                    field: "foreign key",
                    id: None,
                };
            }
        }
        StoreError::Storage(e)
    }
}
