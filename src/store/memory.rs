//! Map-backed record store for tests and embedding callers.

use std::collections::{BTreeMap, HashMap};

use crate::error::FieldsealError;
use crate::model::{Collection, FieldUpdate, PersonRecord, SensitiveFields};
use crate::store::RecordStore;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: HashMap<Collection, BTreeMap<String, SensitiveFields>>,
    writes: usize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(
        &mut self,
        collection: Collection,
        id: impl Into<String>,
        fields: SensitiveFields,
    ) {
        self.collections
            .entry(collection)
            .or_default()
            .insert(id.into(), fields);
    }

    pub fn get(&self, collection: Collection, id: &str) -> Option<&SensitiveFields> {
        self.collections.get(&collection)?.get(id)
    }

    /// Number of `update_fields` calls that reached a record.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl RecordStore for InMemoryStore {
    fn load(&self, collection: Collection) -> Result<Vec<PersonRecord>, FieldsealError> {
        Ok(self
            .collections
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .map(|(id, fields)| PersonRecord {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn update_fields(
        &mut self,
        collection: Collection,
        id: &str,
        updates: &[FieldUpdate],
    ) -> Result<(), FieldsealError> {
        let fields = self
            .collections
            .get_mut(&collection)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| FieldsealError::RecordNotFound {
                collection,
                id: id.to_string(),
            })?;

        for update in updates {
            fields.set(update.field, Some(update.value.clone()));
        }
        self.writes += 1;
        Ok(())
    }
}
