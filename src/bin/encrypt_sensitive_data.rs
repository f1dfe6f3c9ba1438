//! One-time migration that encrypts legacy plaintext CPF, phone and address
//! values in place.
//!
//! Run manually against the application database:
//!
//! ```text
//! ENCRYPTION_KEY=<64 hex> DATABASE_PATH=/path/to/app.db encrypt-sensitive-data
//! ```
//!
//! Safe to re-run: already-encrypted values are skipped. Exit codes: `0` clean
//! run, `1` setup failure, `2` finished with failed records.

use std::process::ExitCode;

use fieldseal::config::{KeyConfig, MigrationConfig};
use fieldseal::migration::journal::{FileJournalSink, MigrationJournal};
use fieldseal::migration::{MigrationOptions, MigrationReport, Migrator};
use fieldseal::store::SqliteStore;
use fieldseal::telemetry::{self, LogFormat};
use fieldseal::{FieldCipher, FieldsealError};

fn main() -> ExitCode {
    // A missing .env file is fine; variables may come from the real environment.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing(LogFormat::from_env());

    match run() {
        Ok(report) => {
            println!("{report}");
            if report.total_failed() > 0 {
                eprintln!(
                    "{} record(s) failed and were left unchanged; re-run after fixing the cause",
                    report.total_failed()
                );
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "migration aborted");
            eprintln!("migration aborted: {e}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<MigrationReport, FieldsealError> {
    let master = KeyConfig::from_env()?.require_master_secret()?;
    let config = MigrationConfig::from_env()?;
    let cipher = FieldCipher::new(master);

    let mut journal = MigrationJournal::new();
    if let Some(path) = &config.journal_path {
        journal.add_forward_sink(Box::new(FileJournalSink::new(path)?));
        tracing::info!(path = %path.display(), "writing migration journal");
    }

    let mut store = SqliteStore::open(&config.database_path)?;
    let options = MigrationOptions {
        dry_run: config.dry_run,
    };

    Migrator::new(&cipher, &mut store, options)
        .with_journal(journal)
        .run()
}
