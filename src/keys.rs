//! Key derivation and ownership.
//!
//! This module owns two responsibilities:
//! 1. Deriving a per-call field key from the master secret and a random salt
//!    using PBKDF2-HMAC-SHA256.
//! 2. Holding key material in types that are opaque, non-cloneable, and
//!    zeroised on drop.
//!
//! This is one of exactly two modules permitted to import `ring` directly
//! (the other is `crypto`).
//!
//! ## Derivation structure
//!
//! ```text
//! PBKDF2-HMAC-SHA256(
//!     password   = master_secret (32 bytes),
//!     salt       = per-call random salt (64 bytes),
//!     iterations = 100_000,
//!     dk_len     = 32
//! )
//! ```
//!
//! A fresh salt is drawn for every encryption, so no two fields share a key
//! even though they share the master secret.

use std::fmt;
use std::num::NonZeroU32;

use ring::{digest, pbkdf2};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::KEY_LEN;
use crate::error::FieldsealError;

/// Size of the per-call salt in bytes.
pub const SALT_LEN: usize = 64;

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

const ITERATIONS: NonZeroU32 = match NonZeroU32::new(PBKDF2_ITERATIONS) {
    Some(n) => n,
    None => panic!("iteration count must be non-zero"),
};

// ---------------------------------------------------------------------------
// Master secret
// ---------------------------------------------------------------------------

/// The long-lived master secret. Every field key is derived from it.
///
/// - Not `Clone`. Share it by wrapping in an `Arc` (see `FieldCipher`).
/// - Zeroised on drop.
/// - `Debug` is redacted so the secret never reaches a log line.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret {
    bytes: [u8; KEY_LEN],
}

impl MasterSecret {
    /// Construct a `MasterSecret` from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Parse the 64-character hex form used in configuration.
    ///
    /// Surrounding whitespace is ignored; anything else that is not exactly
    /// 32 bytes of hex is a configuration error.
    pub fn from_hex(encoded: &str) -> Result<Self, FieldsealError> {
        let trimmed = encoded.trim();
        if trimmed.len() != KEY_LEN * 2 {
            return Err(FieldsealError::Configuration(format!(
                "master secret must be {} hex characters, got {}",
                KEY_LEN * 2,
                trimmed.len()
            )));
        }

        let mut bytes = [0u8; KEY_LEN];
        hex::decode_to_slice(trimmed, &mut bytes).map_err(|_| {
            FieldsealError::Configuration("master secret is not valid hex".to_string())
        })?;
        Ok(Self { bytes })
    }

    /// Short SHA-256 fingerprint of the secret, safe to log.
    ///
    /// Lets operators tell two keys apart without revealing either.
    pub fn fingerprint(&self) -> String {
        let hash = digest::digest(&digest::SHA256, &self.bytes);
        hex::encode(&hash.as_ref()[..8])
    }

    /// Borrow the raw bytes for key derivation.
    ///
    /// `pub(crate)`: raw bytes never leave the crate.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterSecret")
            .field("bytes", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Derived key
// ---------------------------------------------------------------------------

/// A key derived for a single encrypt or decrypt call.
///
/// Not `Clone`, zeroised on drop, and never stored.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_LEN],
}

impl DerivedKey {
    /// `pub(crate)`: raw bytes never leave the crate.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derive the field key for `salt`.
///
/// Deterministic: encryption calls it with a fresh salt, decryption with the
/// salt recovered from the envelope. A `MasterSecret` always holds a full
/// 32-byte key, so derivation cannot fail.
pub fn derive_key(master: &MasterSecret, salt: &[u8; SALT_LEN]) -> DerivedKey {
    let mut bytes = [0u8; KEY_LEN];
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, ITERATIONS, salt, master.as_bytes(), &mut bytes);
    DerivedKey { bytes }
}
