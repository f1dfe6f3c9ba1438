//! Error types for fieldseal.
//!
//! Every variant is a distinct failure mode of the field encryption layer or
//! the migration around it. Messages are intentionally minimal. They signal
//! *what* failed and never carry key material or field values.

use thiserror::Error;

use crate::envelope::NotAnEnvelope;
use crate::model::Collection;

/// The single error type for all fieldseal operations.
#[derive(Debug, Error)]
pub enum FieldsealError {
    /// The master secret is missing or malformed, or another configuration
    /// value could not be interpreted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Key bytes were rejected by the cipher.
    #[error("invalid key")]
    InvalidKey,

    /// The system's random number generator failed to produce bytes.
    #[error("randomness source failed")]
    RandomnessFailure,

    /// The AEAD seal operation failed.
    #[error("encryption failed")]
    EncryptionFailure,

    /// Strict decryption was asked to open a value that is not an envelope.
    /// Read paths that may meet legacy plaintext go through `safe_decrypt`.
    #[error("invalid envelope format: {0}")]
    InvalidEnvelopeFormat(NotAnEnvelope),

    /// The GCM tag did not verify: wrong key, tampered or corrupted data.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Decrypted bytes are not valid UTF-8.
    #[error("decrypted value is not valid UTF-8")]
    Serialization,

    /// An update targeted a record that does not exist.
    #[error("record not found: {collection}/{id}")]
    RecordNotFound { collection: Collection, id: String },

    /// The backing database failed.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The migration journal file could not be opened.
    #[error("journal error: {0}")]
    Journal(#[from] std::io::Error),
}

impl FieldsealError {
    /// Short, value-free label for structured logs and journal entries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::InvalidKey => "invalid_key",
            Self::RandomnessFailure => "randomness",
            Self::EncryptionFailure => "encryption",
            Self::InvalidEnvelopeFormat(_) => "invalid_envelope",
            Self::AuthenticationFailed => "authentication",
            Self::Serialization => "serialization",
            Self::RecordNotFound { .. } => "record_not_found",
            Self::Storage(_) => "storage",
            Self::Journal(_) => "journal",
        }
    }
}
