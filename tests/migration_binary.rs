use std::path::Path;
use std::process::{Command, Output};

use fieldseal::model::{Collection, SensitiveFields};
use fieldseal::store::SqliteStore;

const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

/// Run the migration binary with a clean environment rooted in `dir`.
fn run_migration(dir: &Path, vars: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_encrypt-sensitive-data"));
    cmd.current_dir(dir);
    for name in [
        "ENCRYPTION_KEY",
        "APP_ENV",
        "DATABASE_PATH",
        "MIGRATION_DRY_RUN",
        "MIGRATION_JOURNAL",
        "LOG_FORMAT",
    ] {
        cmd.env_remove(name);
    }
    cmd.env("RUST_LOG", "warn");
    for (name, value) in vars {
        cmd.env(name, value);
    }
    cmd.output().unwrap()
}

fn seed_database(path: &Path) {
    let store = SqliteStore::create(path).unwrap();
    store.create_schema().unwrap();
    store
        .insert(
            Collection::Students,
            "st-1",
            &SensitiveFields {
                cpf: Some("12345678901".into()),
                phone: Some("11987654321".into()),
                address: None,
            },
        )
        .unwrap();
    store
        .insert(
            Collection::Students,
            "st-2",
            &SensitiveFields {
                cpf: Some("98765432100".into()),
                phone: None,
                address: Some("Rua A, 1".into()),
            },
        )
        .unwrap();
    store
        .insert(
            Collection::Staff,
            "s-1",
            &SensitiveFields {
                cpf: None,
                phone: None,
                address: None,
            },
        )
        .unwrap();
}

/// `(encrypted, skipped, failed)` from the report row labelled `label`.
fn report_row(stdout: &str, label: &str) -> (usize, usize, usize) {
    let line = stdout
        .lines()
        .find(|line| line.split_whitespace().next() == Some(label))
        .unwrap_or_else(|| panic!("no `{label}` row in report:\n{stdout}"));
    let numbers: Vec<usize> = line
        .split_whitespace()
        .filter_map(|token| token.parse().ok())
        .collect();
    assert_eq!(numbers.len(), 3, "{line}");
    (numbers[0], numbers[1], numbers[2])
}

#[test]
fn test_missing_key_exits_with_setup_failure() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("escola.db");
    seed_database(&db);

    let output = run_migration(dir.path(), &[("DATABASE_PATH", db.to_str().unwrap())]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ENCRYPTION_KEY"));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_missing_database_exits_with_setup_failure() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("absent.db");

    let output = run_migration(
        dir.path(),
        &[("ENCRYPTION_KEY", KEY), ("DATABASE_PATH", db.to_str().unwrap())],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(!db.exists());
}

#[test]
fn test_clean_run_exits_zero_and_rerun_encrypts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("escola.db");
    seed_database(&db);
    let vars = [("ENCRYPTION_KEY", KEY), ("DATABASE_PATH", db.to_str().unwrap())];

    let first = run_migration(dir.path(), &vars);
    assert_eq!(first.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&first.stdout);
    for collection in Collection::ALL {
        report_row(&stdout, collection.table());
    }
    assert_eq!(report_row(&stdout, "students"), (2, 0, 0));
    assert_eq!(report_row(&stdout, "staff"), (0, 1, 0));
    assert_eq!(report_row(&stdout, "total"), (2, 1, 0));

    let second = run_migration(dir.path(), &vars);
    assert_eq!(second.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&second.stdout);
    assert_eq!(report_row(&stdout, "students"), (0, 2, 0));
    assert_eq!(report_row(&stdout, "total"), (0, 3, 0));
}

#[test]
fn test_dry_run_leaves_database_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("escola.db");
    seed_database(&db);

    let output = run_migration(
        dir.path(),
        &[
            ("ENCRYPTION_KEY", KEY),
            ("DATABASE_PATH", db.to_str().unwrap()),
            ("MIGRATION_DRY_RUN", "true"),
        ],
    );
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(report_row(&String::from_utf8_lossy(&output.stdout), "total"), (2, 1, 0));

    let store = SqliteStore::open(&db).unwrap();
    let st1 = store.get(Collection::Students, "st-1").unwrap().unwrap();
    assert_eq!(st1.cpf.as_deref(), Some("12345678901"));
}

#[test]
fn test_failed_record_exits_two_and_keeps_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("escola.db");
    seed_database(&db);

    let conn = rusqlite::Connection::open(&db).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER lock_st2 BEFORE UPDATE ON students
         WHEN OLD.id = 'st-2'
         BEGIN SELECT RAISE(ABORT, 'row is locked'); END;",
    )
    .unwrap();
    drop(conn);

    let output = run_migration(
        dir.path(),
        &[("ENCRYPTION_KEY", KEY), ("DATABASE_PATH", db.to_str().unwrap())],
    );

    assert_eq!(output.status.code(), Some(2));
    assert_eq!(report_row(&String::from_utf8_lossy(&output.stdout), "students"), (1, 0, 1));

    let store = SqliteStore::open(&db).unwrap();
    let st2 = store.get(Collection::Students, "st-2").unwrap().unwrap();
    assert_eq!(st2.cpf.as_deref(), Some("98765432100"));
}
