//! Persistence error types.

use thiserror::Error;

use crate::model::EntityId;
use crate::registry::EntityKind;

/// Errors surfaced by the persistence layer.
#[derive(Error, Debug)]
pub enum DbError {
    /// Lookup by identifier matched no row
    #[error("{kind} with id {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },

    /// Owning-side mandatory association absent or unsaved and not cascaded
    #[error("{kind} is missing its required '{relation}' reference")]
    MissingReference {
        kind: EntityKind,
        relation: &'static str,
    },

    /// Store-level uniqueness constraint breach
    #[error("unique constraint on {table}.{column} violated by value {value}")]
    UniquenessViolation {
        table: &'static str,
        column: &'static str,
        value: EntityId,
    },

    /// Lazy field touched after its unit of work closed
    #[error("detached access to {kind}.{field}: unit of work is closed")]
    DetachedAccess {
        kind: EntityKind,
        field: &'static str,
    },

    /// Ownership edges of the cascade graph cannot be linearized
    #[error("cyclic ownership dependency involving {0}")]
    CyclicDependency(String),

    /// I/O error during snapshot persistence
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Snapshot file failed format validation
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
