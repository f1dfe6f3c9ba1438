//! # fieldseal
//!
//! Field-level authenticated encryption for regulated personal data (CPF,
//! phone numbers, addresses) stored as plain string columns.
//!
//! Each value is encrypted with AES-256-GCM under a key derived by PBKDF2
//! from a single master secret and a fresh random salt, and stored as a
//! self-describing `salt:iv:tag:ciphertext` hex envelope. Reads go through a
//! permissive decrypt that tolerates legacy plaintext, and a one-time
//! migration encrypts whatever plaintext is still stored.
//!
//! ## Public API
//!
//! - [`FieldCipher`]: encrypt, strict decrypt, safe decrypt.
//! - [`envelope`]: the stored format and its detector.
//! - [`migration::Migrator`]: the idempotent plaintext-to-envelope migration.
//! - [`store::RecordStore`]: the storage seam the migration writes through.
//! - [`config::KeyConfig`]: master secret loading and its startup policy.

// Module declarations.
pub(crate) mod crypto;
pub mod cipher;
pub mod config;
pub mod detect;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod migration;
pub mod model;
pub mod store;
pub mod telemetry;

pub use cipher::FieldCipher;
pub use crypto::{IV_LEN, KEY_LEN, TAG_LEN};
pub use detect::{FieldFormat, SafeDecryptResult};
pub use error::FieldsealError;
pub use keys::{MasterSecret, SALT_LEN};

/// Generate a cryptographically secure master secret.
///
/// In production the secret comes from configuration (see
/// [`config::KeyConfig`]); this is for tests, tooling and key provisioning.
pub fn generate_master_secret() -> Result<MasterSecret, FieldsealError> {
    let bytes = crypto::generate_random_key()?;
    Ok(MasterSecret::from_bytes(bytes))
}
