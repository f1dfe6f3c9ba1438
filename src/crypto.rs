//! Low-level cryptographic operations.
//!
//! This module is one of exactly two places in the crate that import `ring`
//! directly (the other is `keys`), and the only one that touches the AEAD.
//! All other modules perform encryption and decryption exclusively through
//! the functions exposed here.
//!
//! Primitive choices:
//! - **Cipher**: AES-256-GCM (authenticated encryption), no associated data
//! - **IV**: 128-bit (16 bytes), generated fresh per operation via `SystemRandom`
//! - **Tag**: 128-bit (16 bytes), stored detached from the ciphertext
//! - **Key size**: 256 bits (32 bytes)
//!
//! Stored envelopes use a 16-byte IV, which `ring`'s AEAD does not accept, so
//! the cipher itself comes from `aes-gcm` with the nonce size widened. GCM
//! derives the initial counter block by GHASH for any IV that is not 96 bits.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce, Tag};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::FieldsealError;
use crate::keys::DerivedKey;

/// AES-256-GCM with a 16-byte nonce and a 16-byte tag.
type FieldAead = AesGcm<Aes256, U16>;

/// Size of the IV in bytes (128 bits).
pub const IV_LEN: usize = 16;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Size of a master or derived key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Ciphertext and its detached authentication tag.
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

/// Fill a fixed-size array from the system RNG.
///
/// `ring::rand::SystemRandom` is the only source of randomness in the crate.
pub fn random_bytes<const N: usize>() -> Result<[u8; N], FieldsealError> {
    let rng = SystemRandom::new();
    let mut buf = [0u8; N];
    rng.fill(&mut buf).map_err(|_| FieldsealError::RandomnessFailure)?;
    Ok(buf)
}

fn cipher_for(key: &DerivedKey) -> Result<FieldAead, FieldsealError> {
    FieldAead::new_from_slice(key.as_bytes()).map_err(|_| FieldsealError::InvalidKey)
}

/// Encrypt `plaintext` under `key` and `iv`.
///
/// The ciphertext has the same length as the plaintext; the tag is returned
/// separately so the envelope can store it in its own segment.
pub fn seal(
    key: &DerivedKey,
    iv: &[u8; IV_LEN],
    plaintext: &[u8],
) -> Result<Sealed, FieldsealError> {
    let cipher = cipher_for(key)?;
    let mut buffer = plaintext.to_vec();

    let tag = cipher
        .encrypt_in_place_detached(Nonce::<U16>::from_slice(iv), b"", &mut buffer)
        .map_err(|_| FieldsealError::EncryptionFailure)?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(Sealed {
        ciphertext: buffer,
        tag: tag_bytes,
    })
}

/// Decrypt `ciphertext` under `key`, `iv` and `tag`.
///
/// If the key is wrong or any of the inputs were tampered with, the GCM
/// authentication check fails and this function returns
/// `AuthenticationFailed`. The caller receives no partial plaintext.
pub fn open(
    key: &DerivedKey,
    iv: &[u8; IV_LEN],
    tag: &[u8; TAG_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, FieldsealError> {
    let cipher = cipher_for(key)?;
    let mut buffer = ciphertext.to_vec();

    cipher
        .decrypt_in_place_detached(
            Nonce::<U16>::from_slice(iv),
            b"",
            &mut buffer,
            Tag::<U16>::from_slice(tag),
        )
        .map_err(|_| FieldsealError::AuthenticationFailed)?;

    Ok(buffer)
}

/// Generate a cryptographically secure random key.
///
/// Used by `generate_master_secret()` and by the non-production key fallback.
pub fn generate_random_key() -> Result<[u8; KEY_LEN], FieldsealError> {
    random_bytes::<KEY_LEN>()
}
