//! Row storage for person records.
//!
//! The migration and the read/write paths see storage only through
//! [`RecordStore`]: load every record of a collection, then rewrite selected
//! columns of one record. Values cross this boundary as opaque strings.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::error::FieldsealError;
use crate::model::{Collection, FieldUpdate, PersonRecord};

pub trait RecordStore {
    /// Load every record of `collection` with its current stored values.
    fn load(&self, collection: Collection) -> Result<Vec<PersonRecord>, FieldsealError>;

    /// Overwrite the given columns of one record. Columns not listed are left
    /// untouched.
    fn update_fields(
        &mut self,
        collection: Collection,
        id: &str,
        updates: &[FieldUpdate],
    ) -> Result<(), FieldsealError>;
}
