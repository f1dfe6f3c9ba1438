//! SQLite-backed record store.
//!
//! Each collection is a table with an `id` primary key and nullable `cpf`,
//! `phone` and `address` text columns. Other columns may exist and are never
//! read or written here.

use std::path::Path;

use rusqlite::{params_from_iter, Connection, OpenFlags, OptionalExtension};

use crate::error::FieldsealError;
use crate::model::{Collection, FieldUpdate, PersonRecord, SensitiveFields};
use crate::store::RecordStore;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open an existing database file. A missing file is an error rather
    /// than a new empty database.
    pub fn open(path: &Path) -> Result<Self, FieldsealError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        Ok(Self { conn })
    }

    /// Open a database file, creating it if needed.
    pub fn create(path: &Path) -> Result<Self, FieldsealError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self, FieldsealError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Create the person tables if they do not exist yet.
    ///
    /// For tests and local bootstrap; the migration never creates tables.
    pub fn create_schema(&self) -> Result<(), FieldsealError> {
        for collection in Collection::ALL {
            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id      TEXT PRIMARY KEY,
                    cpf     TEXT,
                    phone   TEXT,
                    address TEXT
                );",
                collection.table()
            ))?;
        }
        Ok(())
    }

    /// Insert or replace a record.
    pub fn insert(
        &self,
        collection: Collection,
        id: &str,
        fields: &SensitiveFields,
    ) -> Result<(), FieldsealError> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (id, cpf, phone, address) VALUES (?1, ?2, ?3, ?4)",
                collection.table()
            ),
            (id, &fields.cpf, &fields.phone, &fields.address),
        )?;
        Ok(())
    }

    pub fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<SensitiveFields>, FieldsealError> {
        let fields = self
            .conn
            .query_row(
                &format!(
                    "SELECT cpf, phone, address FROM {} WHERE id = ?1",
                    collection.table()
                ),
                [id],
                |row| {
                    Ok(SensitiveFields {
                        cpf: row.get(0)?,
                        phone: row.get(1)?,
                        address: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(fields)
    }
}

impl RecordStore for SqliteStore {
    fn load(&self, collection: Collection) -> Result<Vec<PersonRecord>, FieldsealError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, cpf, phone, address FROM {} ORDER BY id",
            collection.table()
        ))?;

        let iter = stmt.query_map([], |row| {
            Ok(PersonRecord {
                id: row.get(0)?,
                fields: SensitiveFields {
                    cpf: row.get(1)?,
                    phone: row.get(2)?,
                    address: row.get(3)?,
                },
            })
        })?;

        let mut records = Vec::new();
        for record in iter {
            records.push(record?);
        }
        Ok(records)
    }

    fn update_fields(
        &mut self,
        collection: Collection,
        id: &str,
        updates: &[FieldUpdate],
    ) -> Result<(), FieldsealError> {
        if updates.is_empty() {
            return Ok(());
        }

        let assignments: Vec<String> = updates
            .iter()
            .enumerate()
            .map(|(i, update)| format!("{} = ?{}", update.field.column(), i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            collection.table(),
            assignments.join(", "),
            updates.len() + 1
        );

        let params = updates
            .iter()
            .map(|update| update.value.as_str())
            .chain(std::iter::once(id));
        let changed = self.conn.execute(&sql, params_from_iter(params))?;

        if changed == 0 {
            return Err(FieldsealError::RecordNotFound {
                collection,
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
