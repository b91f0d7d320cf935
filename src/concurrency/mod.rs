//! Optimistic concurrency for persisted state.
//!
//! Transitions only change the in-memory record. [`ConcurrentRecord`] keeps
//! the state columns as they were last read from or written to the store,
//! and only saves when the stored row still holds those values. A save that
//! finds the state changed underneath it fails with
//! [`ConcurrencyError::ConcurrentModification`].
//!
//! # Example
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use statecraft::concurrency::{ConcurrentRecord, InMemoryStore, Persisted};
//! use uuid::Uuid;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Order {
//!     state: String,
//! }
//!
//! impl Persisted for Order {
//!     const TABLE: &'static str = "orders";
//!
//!     fn state_columns() -> &'static [&'static str] {
//!         &["state"]
//!     }
//! }
//!
//! let store = InMemoryStore::new();
//! let id = Uuid::new_v4();
//! let mut order = ConcurrentRecord::new(id, Order { state: "new".into() }).unwrap();
//! order.save(&store).unwrap();
//!
//! let mut stale = ConcurrentRecord::<Order>::load(&store, id).unwrap();
//! order.state = "paid".into();
//! order.save(&store).unwrap();
//!
//! stale.state = "cancelled".into();
//! assert!(stale.save(&store).is_err());
//! ```
//!
//! Which columns are compared is declared by [`Persisted::state_columns`].
//! [`ensure_guarded`] checks a built state field against that list.

use serde::de::DeserializeOwned;
use serde::Serialize;
use crate::effects::StateField;
use serde_json::Value;
use std::ops::{Deref, DerefMut};
use tracing::{debug, warn};
use uuid::Uuid;

pub mod error;
pub mod store;

pub use error::ConcurrencyError;
pub use store::{InMemoryStore, RecordStore, Row};

/// A model stored as one row of a table.
pub trait Persisted: Serialize + DeserializeOwned {
    const TABLE: &'static str;

    /// Columns holding state fields; these are what a save compares.
    ///
    /// Every state field of the model must be listed under its field name.
    /// A state field left out is not guarded; see [`ensure_guarded`].
    fn state_columns() -> &'static [&'static str];
}

/// A record plus the state columns it was loaded with.
#[derive(Debug, Clone)]
pub struct ConcurrentRecord<M> {
    id: Uuid,
    record: M,
    snapshot: Row,
}

impl<M: Persisted> ConcurrentRecord<M> {
    /// Wrap a record that has not been read from the store.
    pub fn new(id: Uuid, record: M) -> Result<Self, ConcurrencyError> {
        let snapshot = state_snapshot::<M>(&to_row(&record)?)?;
        Ok(Self {
            id,
            record,
            snapshot,
        })
    }

    pub fn load<S: RecordStore + ?Sized>(store: &S, id: Uuid) -> Result<Self, ConcurrencyError> {
        let row = store
            .fetch(M::TABLE, id)?
            .ok_or(ConcurrencyError::NotFound { table: M::TABLE, id })?;
        let snapshot = state_snapshot::<M>(&row)?;
        let record = from_row(row)?;
        Ok(Self {
            id,
            record,
            snapshot,
        })
    }

    /// Persist the record if its stored state still matches the snapshot.
    ///
    /// A missing row is inserted. On success the snapshot becomes the state
    /// just written.
    pub fn save<S: RecordStore + ?Sized>(&mut self, store: &S) -> Result<(), ConcurrencyError> {
        let row = to_row(&self.record)?;
        let snapshot = state_snapshot::<M>(&row)?;

        let written = store.update_where(M::TABLE, self.id, &self.snapshot, row.clone())?;
        if written == 0 {
            if store.exists(M::TABLE, self.id)? {
                let expected = Value::Object(self.snapshot.clone());
                warn!(
                    table = M::TABLE,
                    id = %self.id,
                    expected = %expected,
                    "save rejected: state changed since load"
                );
                return Err(ConcurrencyError::ConcurrentModification {
                    table: M::TABLE,
                    id: self.id,
                });
            }
            debug!(table = M::TABLE, id = %self.id, "inserting new row");
            store.insert(M::TABLE, self.id, row)?;
        }

        self.snapshot = snapshot;
        Ok(())
    }

    /// Reload the record and its snapshot from the store.
    pub fn refresh<S: RecordStore + ?Sized>(&mut self, store: &S) -> Result<(), ConcurrencyError> {
        *self = Self::load(store, self.id)?;
        Ok(())
    }
}

impl<M> ConcurrentRecord<M> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// State columns as last read from or written to the store.
    pub fn snapshot(&self) -> &Row {
        &self.snapshot
    }

    pub fn into_inner(self) -> M {
        self.record
    }
}

impl<M> Deref for ConcurrentRecord<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.record
    }
}

impl<M> DerefMut for ConcurrentRecord<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.record
    }
}

/// Check that saves of `M` compare the column `field` writes.
pub fn ensure_guarded<M: Persisted>(field: &StateField<M>) -> Result<(), ConcurrencyError> {
    if M::state_columns().iter().any(|column| *column == field.name()) {
        return Ok(());
    }
    warn!(table = M::TABLE, field = field.name(), "state field is not a state column");
    Err(ConcurrencyError::UnguardedField {
        table: M::TABLE,
        field: field.name().to_string(),
    })
}

fn to_row<M: Serialize>(record: &M) -> Result<Row, ConcurrencyError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(ConcurrencyError::Serialization(format!(
            "expected an object, got {other}"
        ))),
        Err(err) => Err(ConcurrencyError::Serialization(err.to_string())),
    }
}

fn from_row<M: DeserializeOwned>(row: Row) -> Result<M, ConcurrencyError> {
    serde_json::from_value(Value::Object(row))
        .map_err(|err| ConcurrencyError::Deserialization(err.to_string()))
}

fn state_snapshot<M: Persisted>(row: &Row) -> Result<Row, ConcurrencyError> {
    M::state_columns()
        .iter()
        .map(|column| {
            row.get(*column)
                .map(|value| (column.to_string(), value.clone()))
                .ok_or_else(|| ConcurrencyError::MissingColumn {
                    table: M::TABLE,
                    column: column.to_string(),
                })
        })
        .collect()
}
