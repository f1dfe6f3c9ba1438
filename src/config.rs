//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the master secret policy.
//! Configuration is read once at startup and handed to components
//! explicitly; nothing reads the environment after that.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `ENCRYPTION_KEY` | Master secret, 64 hex characters (32 bytes) | Required in production |
//! | `APP_ENV` | `production`, `development` or `test` | `development` |
//! | `DATABASE_PATH` | SQLite database walked by the migration | Required by the migration |
//! | `MIGRATION_DRY_RUN` | `1`/`true` to count without writing | `false` |
//! | `MIGRATION_JOURNAL` | JSON-lines file receiving migration outcomes | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;

use crate::crypto;
use crate::error::FieldsealError;
use crate::keys::MasterSecret;

/// Master secret, hex encoded.
pub const ENCRYPTION_KEY_ENV: &str = "ENCRYPTION_KEY";

/// Deployment environment name.
pub const APP_ENV_ENV: &str = "APP_ENV";

/// Path of the SQLite database the migration walks.
pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";

pub const MIGRATION_DRY_RUN_ENV: &str = "MIGRATION_DRY_RUN";

pub const MIGRATION_JOURNAL_ENV: &str = "MIGRATION_JOURNAL";

/// Logging format: `json` or `pretty`.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeEnvironment {
    Production,
    #[default]
    Development,
    Test,
}

impl RuntimeEnvironment {
    pub fn parse(value: &str) -> Result<Self, FieldsealError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => Err(FieldsealError::Configuration(format!(
                "unknown {APP_ENV_ENV} value: {other}"
            ))),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Where the master secret comes from and which policy applies to it.
#[derive(Clone, Default)]
pub struct KeyConfig {
    encoded_key: Option<String>,
    environment: RuntimeEnvironment,
}

impl std::fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyConfig")
            .field("encoded_key", &self.encoded_key.as_ref().map(|_| "<redacted>"))
            .field("environment", &self.environment)
            .finish()
    }
}

impl KeyConfig {
    pub fn new(encoded_key: Option<String>, environment: RuntimeEnvironment) -> Self {
        Self {
            encoded_key,
            environment,
        }
    }

    /// Read `ENCRYPTION_KEY` and `APP_ENV` from the process environment.
    pub fn from_env() -> Result<Self, FieldsealError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FieldsealError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup(APP_ENV_ENV) {
            Some(value) => RuntimeEnvironment::parse(&value)?,
            None => RuntimeEnvironment::default(),
        };
        let encoded_key = lookup(ENCRYPTION_KEY_ENV).filter(|v| !v.trim().is_empty());
        Ok(Self::new(encoded_key, environment))
    }

    pub fn environment(&self) -> RuntimeEnvironment {
        self.environment
    }

    /// Startup policy for request-serving processes.
    ///
    /// A missing or malformed key is fatal in production. Elsewhere a random
    /// ephemeral key is generated and a warning is logged; data encrypted
    /// with it is unreadable after the process exits.
    pub fn master_secret(&self) -> Result<MasterSecret, FieldsealError> {
        match self.parse_key() {
            Ok(secret) => Ok(secret),
            Err(e) if self.environment.is_production() => Err(e),
            Err(e) => {
                let secret = MasterSecret::from_bytes(crypto::generate_random_key()?);
                tracing::warn!(
                    reason = %e,
                    environment = ?self.environment,
                    key_fingerprint = %secret.fingerprint(),
                    "{ENCRYPTION_KEY_ENV} unusable, generated an ephemeral master secret; \
                     values encrypted now cannot be decrypted after restart"
                );
                Ok(secret)
            }
        }
    }

    /// Strict policy for the migration: the key must be configured in every
    /// environment, since rows encrypted under an ephemeral key would be lost.
    pub fn require_master_secret(&self) -> Result<MasterSecret, FieldsealError> {
        self.parse_key()
    }

    fn parse_key(&self) -> Result<MasterSecret, FieldsealError> {
        let encoded = self.encoded_key.as_deref().ok_or_else(|| {
            FieldsealError::Configuration(format!("{ENCRYPTION_KEY_ENV} is not set"))
        })?;
        MasterSecret::from_hex(encoded)
    }
}

/// Settings of the migration binary.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub database_path: PathBuf,
    pub dry_run: bool,
    pub journal_path: Option<PathBuf>,
}

impl MigrationConfig {
    pub fn from_env() -> Result<Self, FieldsealError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, FieldsealError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = lookup(DATABASE_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                FieldsealError::Configuration(format!("{DATABASE_PATH_ENV} is not set"))
            })?;

        let dry_run = match lookup(MIGRATION_DRY_RUN_ENV) {
            Some(value) => parse_flag(MIGRATION_DRY_RUN_ENV, &value)?,
            None => false,
        };

        let journal_path = lookup(MIGRATION_JOURNAL_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            database_path,
            dry_run,
            journal_path,
        })
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, FieldsealError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(FieldsealError::Configuration(format!(
            "{name} must be a boolean, got {other}"
        ))),
    }
}
