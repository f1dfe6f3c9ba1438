use std::sync::{Arc, Mutex};

use fieldseal::detect::{classify, FieldFormat};
use fieldseal::migration::journal::{
    FileJournalSink, JournalEntry, JournalSink, MigrationJournal, RecordOutcome,
};
use fieldseal::migration::{MigrationOptions, Migrator};
use fieldseal::model::{Collection, FieldUpdate, PersonRecord, SensitiveField, SensitiveFields};
use fieldseal::store::{InMemoryStore, RecordStore, SqliteStore};
use fieldseal::{FieldCipher, FieldsealError, MasterSecret};

fn cipher() -> FieldCipher {
    FieldCipher::new(MasterSecret::from_bytes([21u8; 32]))
}

fn person(cpf: Option<&str>, phone: Option<&str>, address: Option<&str>) -> SensitiveFields {
    SensitiveFields {
        cpf: cpf.map(String::from),
        phone: phone.map(String::from),
        address: address.map(String::from),
    }
}

/// Legacy rows across all four collections, one of them already migrated.
fn seed(cipher: &FieldCipher) -> Vec<(Collection, &'static str, SensitiveFields)> {
    vec![
        (
            Collection::Students,
            "st-1",
            person(Some("12345678901"), Some("11987654321"), Some("Rua A, 1")),
        ),
        (Collection::Students, "st-2", person(None, Some("11900001111"), None)),
        (
            Collection::Teachers,
            "t-1",
            person(Some(&cipher.encrypt("98765432100").unwrap()), None, None),
        ),
        (Collection::Staff, "s-1", person(Some("11122233344"), None, Some("Av. B, 2"))),
        (Collection::AdminTeam, "a-1", person(None, None, None)),
    ]
}

fn revealed<S: RecordStore>(store: &S, cipher: &FieldCipher) -> Vec<SensitiveFields> {
    Collection::ALL
        .into_iter()
        .flat_map(|c| store.load(c).unwrap())
        .map(|record| record.fields.reveal(cipher))
        .collect()
}

#[test]
fn test_second_run_encrypts_nothing_in_memory() {
    let cipher = cipher();
    let mut store = InMemoryStore::new();
    for (collection, id, fields) in seed(&cipher) {
        store.insert(collection, id, fields);
    }
    let before = revealed(&store, &cipher);

    let first = Migrator::new(&cipher, &mut store, MigrationOptions::default())
        .run()
        .unwrap();
    assert_eq!(first.collection(Collection::Students).unwrap().encrypted, 2);
    assert_eq!(first.collection(Collection::Students).unwrap().fields_encrypted, 4);
    assert_eq!(first.collection(Collection::Teachers).unwrap().skipped, 1);
    assert_eq!(first.collection(Collection::Staff).unwrap().encrypted, 1);
    assert_eq!(first.collection(Collection::AdminTeam).unwrap().skipped, 1);
    assert_eq!(first.total_failed(), 0);

    let after_first = revealed(&store, &cipher);
    let writes_after_first = store.writes();

    let second = Migrator::new(&cipher, &mut store, MigrationOptions::default())
        .run()
        .unwrap();
    for report in &second.collections {
        assert_eq!(report.encrypted, 0, "{} re-encrypted", report.collection);
    }
    assert_eq!(store.writes(), writes_after_first, "no-op run must not write");

    assert_eq!(before, after_first);
    assert_eq!(after_first, revealed(&store, &cipher));
}

#[test]
fn test_every_value_is_an_envelope_after_migration_in_sqlite() {
    let cipher = cipher();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("escola.db");

    let mut store = SqliteStore::create(&path).unwrap();
    store.create_schema().unwrap();
    for (collection, id, fields) in seed(&cipher) {
        store.insert(collection, id, &fields).unwrap();
    }
    let before = revealed(&store, &cipher);

    let report = Migrator::new(&cipher, &mut store, MigrationOptions::default())
        .run()
        .unwrap();
    assert_eq!(report.total_encrypted(), 3);
    drop(store);

    // Reopen to read what actually reached the file.
    let mut store = SqliteStore::open(&path).unwrap();
    for collection in Collection::ALL {
        for record in store.load(collection).unwrap() {
            for field in SensitiveField::ALL {
                if let Some(value) = record.fields.get(field) {
                    assert_eq!(classify(value), FieldFormat::Envelope);
                }
            }
        }
    }
    assert_eq!(before, revealed(&store, &cipher));

    let second = Migrator::new(&cipher, &mut store, MigrationOptions::default())
        .run()
        .unwrap();
    assert_eq!(second.total_encrypted(), 0);
    assert_eq!(second.total_skipped(), 5);
}

#[test]
fn test_interrupted_run_is_completed_by_rerun() {
    // Simulate a crash after the students collection: only it is migrated.
    let cipher = cipher();
    let mut store = InMemoryStore::new();
    for (collection, id, fields) in seed(&cipher) {
        store.insert(collection, id, fields);
    }
    Migrator::new(&cipher, &mut store, MigrationOptions::default())
        .migrate_collection(Collection::Students)
        .unwrap();

    let rerun = Migrator::new(&cipher, &mut store, MigrationOptions::default())
        .run()
        .unwrap();
    assert_eq!(rerun.collection(Collection::Students).unwrap().encrypted, 0);
    assert_eq!(rerun.collection(Collection::Staff).unwrap().encrypted, 1);
}

/// Fails every write to one record id and delegates the rest.
struct FlakyStore {
    inner: InMemoryStore,
    poisoned_id: &'static str,
}

impl RecordStore for FlakyStore {
    fn load(&self, collection: Collection) -> Result<Vec<PersonRecord>, FieldsealError> {
        self.inner.load(collection)
    }

    fn update_fields(
        &mut self,
        collection: Collection,
        id: &str,
        updates: &[FieldUpdate],
    ) -> Result<(), FieldsealError> {
        if id == self.poisoned_id {
            return Err(FieldsealError::RecordNotFound {
                collection,
                id: id.to_string(),
            });
        }
        self.inner.update_fields(collection, id, updates)
    }
}

struct SharedVecSink {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl JournalSink for SharedVecSink {
    fn append(&mut self, entry: &JournalEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

#[test]
fn test_failed_record_is_counted_and_run_continues() {
    let cipher = cipher();
    let mut inner = InMemoryStore::new();
    for (collection, id, fields) in seed(&cipher) {
        inner.insert(collection, id, fields);
    }
    let mut store = FlakyStore {
        inner,
        poisoned_id: "st-1",
    };

    let entries = Arc::new(Mutex::new(Vec::new()));
    let mut journal = MigrationJournal::new();
    journal.add_forward_sink(Box::new(SharedVecSink {
        entries: Arc::clone(&entries),
    }));

    let report = Migrator::new(&cipher, &mut store, MigrationOptions::default())
        .with_journal(journal)
        .run()
        .unwrap();

    let students = report.collection(Collection::Students).unwrap();
    assert_eq!(students.failed, 1);
    assert_eq!(students.encrypted, 1);
    assert_eq!(report.collection(Collection::Staff).unwrap().encrypted, 1);

    // The failed record keeps its plaintext for the next run.
    let st1 = store.inner.get(Collection::Students, "st-1").unwrap();
    assert_eq!(st1.cpf.as_deref(), Some("12345678901"));

    let entries = entries.lock().unwrap();
    assert_eq!(entries.len(), 5);
    let failed: Vec<_> = entries
        .iter()
        .filter(|e| e.outcome == RecordOutcome::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].record_id, "st-1");
    assert_eq!(failed[0].error.as_deref(), Some("record_not_found"));
}

#[test]
fn test_unreadable_collection_aborts_run() {
    let cipher = cipher();
    let mut store = SqliteStore::in_memory().unwrap();

    let result = Migrator::new(&cipher, &mut store, MigrationOptions::default()).run();
    assert!(matches!(result, Err(FieldsealError::Storage(_))));
}

#[test]
fn test_journal_file_never_contains_values() {
    let cipher = cipher();
    let dir = tempfile::tempdir().unwrap();
    let journal_path = dir.path().join("migration.jsonl");

    let mut store = InMemoryStore::new();
    for (collection, id, fields) in seed(&cipher) {
        store.insert(collection, id, fields);
    }

    let mut journal = MigrationJournal::new();
    journal.add_forward_sink(Box::new(FileJournalSink::new(&journal_path).unwrap()));
    let journal = {
        let mut migrator = Migrator::new(&cipher, &mut store, MigrationOptions::default())
            .with_journal(journal);
        migrator.run().unwrap();
        migrator.into_journal()
    };
    assert_eq!(journal.len(), 5);

    let contents = std::fs::read_to_string(&journal_path).unwrap();
    assert_eq!(contents.lines().count(), 5);
    for secret in ["12345678901", "11987654321", "Rua A, 1", "11122233344"] {
        assert!(!contents.contains(secret));
    }
}
