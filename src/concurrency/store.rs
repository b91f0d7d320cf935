//! Record stores the concurrency guard writes through.

use crate::concurrency::error::ConcurrencyError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// One persisted row: column name to value.
pub type Row = Map<String, Value>;

/// Storage the guard relies on.
///
/// `update_where` must compare and write as one atomic step per row; the
/// guard is only as race-free as that operation.
pub trait RecordStore {
    fn fetch(&self, table: &str, id: Uuid) -> Result<Option<Row>, ConcurrencyError>;

    fn exists(&self, table: &str, id: Uuid) -> Result<bool, ConcurrencyError>;

    fn insert(&self, table: &str, id: Uuid, row: Row) -> Result<(), ConcurrencyError>;

    /// Replace the row `id` if every column in `expected` still holds the
    /// expected value. Returns the number of rows written (0 or 1).
    fn update_where(
        &self,
        table: &str,
        id: Uuid,
        expected: &Row,
        row: Row,
    ) -> Result<usize, ConcurrencyError>;
}

/// Process-local store, mostly for tests and demos.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: RwLock<HashMap<(String, Uuid), Row>>,
}

fn poisoned<T>(_: PoisonError<T>) -> ConcurrencyError {
    ConcurrencyError::Store("store lock poisoned".to_string())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in `table`.
    pub fn len(&self, table: &str) -> Result<usize, ConcurrencyError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.keys().filter(|(t, _)| t == table).count())
    }

    /// Overwrite a row unconditionally, as another writer would.
    pub fn put(&self, table: &str, id: Uuid, row: Row) -> Result<(), ConcurrencyError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        rows.insert((table.to_string(), id), row);
        Ok(())
    }
}

impl RecordStore for InMemoryStore {
    fn fetch(&self, table: &str, id: Uuid) -> Result<Option<Row>, ConcurrencyError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.get(&(table.to_string(), id)).cloned())
    }

    fn exists(&self, table: &str, id: Uuid) -> Result<bool, ConcurrencyError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.contains_key(&(table.to_string(), id)))
    }

    fn insert(&self, table: &str, id: Uuid, row: Row) -> Result<(), ConcurrencyError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        let key = (table.to_string(), id);
        if rows.contains_key(&key) {
            return Err(ConcurrencyError::Store(format!(
                "duplicate key {id} in {table}"
            )));
        }
        rows.insert(key, row);
        Ok(())
    }

    fn update_where(
        &self,
        table: &str,
        id: Uuid,
        expected: &Row,
        row: Row,
    ) -> Result<usize, ConcurrencyError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        let Some(stored) = rows.get_mut(&(table.to_string(), id)) else {
            return Ok(0);
        };
        let unchanged = expected
            .iter()
            .all(|(column, value)| stored.get(column) == Some(value));
        if !unchanged {
            return Ok(0);
        }
        *stored = row;
        Ok(1)
    }
}
