//! One-time migration of legacy plaintext fields to envelopes.
//!
//! Walks every collection in order, record by record. For each record every
//! present field is classified; plaintext is encrypted and staged, envelopes
//! are left alone. A record is written only when something was staged.
//!
//! Each record's fate depends only on its own stored values, so the run is
//! idempotent and can be interrupted and restarted at any point: a second run
//! finds nothing left to encrypt.

pub mod journal;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cipher::FieldCipher;
use crate::detect::{self, FieldFormat};
use crate::error::FieldsealError;
use crate::model::{Collection, FieldUpdate, PersonRecord, SensitiveField};
use crate::store::RecordStore;

use journal::{JournalEntry, MigrationJournal, RecordOutcome};

/// Where a collection is in the migration.
///
/// `NotStarted` and `Scanning` are only observable while a collection is
/// being walked. A report returned by [`Migrator::migrate_collection`] or
/// [`Migrator::run`] always reads `Completed`; a collection that cannot be
/// loaded produces an error instead of a partial report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionPhase {
    NotStarted,
    Scanning,
    Completed,
}

/// Tally for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionReport {
    pub collection: Collection,
    /// `Completed` in every returned report.
    pub phase: CollectionPhase,
    /// Records rewritten (or that would be, in a dry run).
    pub encrypted: usize,
    /// Records left untouched.
    pub skipped: usize,
    /// Records whose encryption or write failed.
    pub failed: usize,
    /// Individual fields encrypted across all rewritten records.
    pub fields_encrypted: usize,
}

impl CollectionReport {
    fn new(collection: Collection) -> Self {
        Self {
            collection,
            phase: CollectionPhase::NotStarted,
            encrypted: 0,
            skipped: 0,
            failed: 0,
            fields_encrypted: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub collections: Vec<CollectionReport>,
}

impl MigrationReport {
    pub fn collection(&self, collection: Collection) -> Option<&CollectionReport> {
        self.collections.iter().find(|c| c.collection == collection)
    }

    pub fn total_encrypted(&self) -> usize {
        self.collections.iter().map(|c| c.encrypted).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.collections.iter().map(|c| c.skipped).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.collections.iter().map(|c| c.failed).sum()
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "Sensitive field migration (dry run, nothing written)")?;
        } else {
            writeln!(f, "Sensitive field migration")?;
        }
        for c in &self.collections {
            writeln!(
                f,
                "  {:<12} encrypted: {:>6}  skipped: {:>6}  failed: {:>6}",
                c.collection.to_string(),
                c.encrypted,
                c.skipped,
                c.failed
            )?;
        }
        write!(
            f,
            "  {:<12} encrypted: {:>6}  skipped: {:>6}  failed: {:>6}",
            "total",
            self.total_encrypted(),
            self.total_skipped(),
            self.total_failed()
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    /// Classify and count without writing anything.
    pub dry_run: bool,
}

pub struct Migrator<'a, S: RecordStore> {
    cipher: &'a FieldCipher,
    store: &'a mut S,
    options: MigrationOptions,
    journal: MigrationJournal,
}

impl<'a, S: RecordStore> Migrator<'a, S> {
    pub fn new(cipher: &'a FieldCipher, store: &'a mut S, options: MigrationOptions) -> Self {
        Self {
            cipher,
            store,
            options,
            journal: MigrationJournal::new(),
        }
    }

    /// Use a journal that already has forwarding sinks attached.
    pub fn with_journal(mut self, journal: MigrationJournal) -> Self {
        self.journal = journal;
        self
    }

    pub fn journal(&self) -> &MigrationJournal {
        &self.journal
    }

    pub fn into_journal(self) -> MigrationJournal {
        self.journal
    }

    /// Migrate every collection in order.
    ///
    /// Per-record failures are counted and the run continues. A collection
    /// that cannot be read at all aborts the run.
    pub fn run(&mut self) -> Result<MigrationReport, FieldsealError> {
        let started_at = Utc::now();
        tracing::info!(
            dry_run = self.options.dry_run,
            key_fingerprint = %self.cipher.key_fingerprint(),
            "starting sensitive field migration"
        );

        let mut collections = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            collections.push(self.migrate_collection(collection)?);
        }

        Ok(MigrationReport {
            started_at,
            finished_at: Utc::now(),
            dry_run: self.options.dry_run,
            collections,
        })
    }

    pub fn migrate_collection(
        &mut self,
        collection: Collection,
    ) -> Result<CollectionReport, FieldsealError> {
        let mut report = CollectionReport::new(collection);

        let records = self.store.load(collection)?;
        report.phase = CollectionPhase::Scanning;
        tracing::info!(%collection, records = records.len(), "scanning collection");

        for record in &records {
            let (outcome, fields, error) = match self.migrate_record(collection, record) {
                Ok((outcome, fields)) => (outcome, fields, None),
                Err((fields, e)) => {
                    tracing::warn!(
                        %collection,
                        record_id = %record.id,
                        error = e.kind(),
                        "failed to migrate record"
                    );
                    (RecordOutcome::Failed, fields, Some(e.kind().to_string()))
                }
            };

            match outcome {
                RecordOutcome::Rewritten => {
                    report.encrypted += 1;
                    report.fields_encrypted += fields.len();
                }
                RecordOutcome::Unchanged => report.skipped += 1,
                RecordOutcome::Failed => report.failed += 1,
            }

            self.journal.append(JournalEntry {
                collection,
                record_id: record.id.clone(),
                outcome,
                fields,
                error,
                dry_run: self.options.dry_run,
                timestamp: Utc::now(),
            });
        }

        report.phase = CollectionPhase::Completed;
        tracing::info!(
            %collection,
            encrypted = report.encrypted,
            skipped = report.skipped,
            failed = report.failed,
            "collection done"
        );
        Ok(report)
    }

    fn migrate_record(
        &mut self,
        collection: Collection,
        record: &PersonRecord,
    ) -> Result<(RecordOutcome, Vec<SensitiveField>), (Vec<SensitiveField>, FieldsealError)> {
        let pending: Vec<(SensitiveField, &str)> = SensitiveField::ALL
            .into_iter()
            .filter_map(|field| record.fields.get(field).map(|value| (field, value)))
            .filter(|(_, value)| detect::classify(value) == FieldFormat::LegacyPlaintext)
            .collect();
        let fields: Vec<SensitiveField> = pending.iter().map(|(field, _)| *field).collect();

        if pending.is_empty() {
            tracing::debug!(%collection, record_id = %record.id, "record already migrated");
            return Ok((RecordOutcome::Unchanged, fields));
        }

        let mut updates = Vec::with_capacity(pending.len());
        for (field, value) in pending {
            let encrypted = self
                .cipher
                .encrypt(value)
                .map_err(|e| (fields.clone(), e))?;
            updates.push(FieldUpdate {
                field,
                value: encrypted,
            });
        }

        if !self.options.dry_run {
            self.store
                .update_fields(collection, &record.id, &updates)
                .map_err(|e| (fields.clone(), e))?;
        }

        tracing::debug!(
            %collection,
            record_id = %record.id,
            fields = updates.len(),
            dry_run = self.options.dry_run,
            "record rewritten"
        );
        Ok((RecordOutcome::Rewritten, fields))
    }
}
