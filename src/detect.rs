//! Format detection and the permissive read path.
//!
//! Stored data mixes migrated envelopes with legacy plaintext. Read paths
//! serving responses go through [`safe_decrypt`], which never fails: it
//! decrypts what looks like an envelope and hands back everything else as
//! it was stored.

use crate::cipher::FieldCipher;
use crate::envelope::Envelope;

/// What a stored field value looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    Empty,
    Envelope,
    LegacyPlaintext,
}

/// Classify a stored value without decrypting it.
pub fn classify(input: &str) -> FieldFormat {
    if input.is_empty() {
        FieldFormat::Empty
    } else if Envelope::decode(input).is_ok() {
        FieldFormat::Envelope
    } else {
        FieldFormat::LegacyPlaintext
    }
}

/// Outcome of a permissive decrypt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafeDecryptResult {
    /// The value was an envelope and decrypted cleanly.
    Plaintext(String),
    /// The value was not envelope-shaped (or empty) and is returned as stored.
    Legacy(String),
    /// The value was envelope-shaped but did not decrypt. Carries the stored
    /// value unchanged.
    Undecryptable(String),
}

impl SafeDecryptResult {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plaintext(s) | Self::Legacy(s) | Self::Undecryptable(s) => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Self::Plaintext(s) | Self::Legacy(s) | Self::Undecryptable(s) => s,
        }
    }

    /// True when the caller is receiving ciphertext instead of plaintext.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Undecryptable(_))
    }
}

/// Decrypt `input` if it is an envelope, otherwise return it unchanged.
///
/// Cipher failures on an envelope-shaped value are absorbed: the stored value
/// comes back as `Undecryptable` and a warning is logged with the failure
/// kind only.
pub fn safe_decrypt(cipher: &FieldCipher, input: &str) -> SafeDecryptResult {
    if input.is_empty() {
        return SafeDecryptResult::Legacy(String::new());
    }

    let envelope = match Envelope::decode(input) {
        Ok(envelope) => envelope,
        Err(reason) => {
            tracing::trace!(%reason, "value is not an envelope, treating as legacy plaintext");
            return SafeDecryptResult::Legacy(input.to_string());
        }
    };

    match cipher.open_envelope(&envelope) {
        Ok(plaintext) => SafeDecryptResult::Plaintext(plaintext),
        Err(e) => {
            tracing::warn!(
                error = e.kind(),
                key_fingerprint = %cipher.key_fingerprint(),
                "stored field could not be decrypted, returning stored value"
            );
            SafeDecryptResult::Undecryptable(input.to_string())
        }
    }
}
