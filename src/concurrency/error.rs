//! Concurrency guard error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while loading or saving a guarded record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConcurrencyError {
    /// The stored state no longer matches the snapshot taken at load time
    #[error("Concurrent modification of {table} row {id}: state changed since it was loaded")]
    ConcurrentModification { table: &'static str, id: Uuid },

    /// No row exists for the requested key
    #[error("No {table} row with id {id}")]
    NotFound { table: &'static str, id: Uuid },

    /// Record could not be turned into a row
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Row could not be turned back into a record
    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    /// A declared state column is absent from the serialized record
    #[error("State column '{column}' missing from {table} row")]
    MissingColumn { table: &'static str, column: String },

    /// A state field's column is not among the model's state columns
    #[error("State field '{field}' is not a state column of {table}; saves would not guard it")]
    UnguardedField { table: &'static str, field: String },

    /// The backing store failed
    #[error("Store failure: {0}")]
    Store(String),
}
