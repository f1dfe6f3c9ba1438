//! Field encryption service.
//!
//! `FieldCipher` is the entry point callers hold. It owns a shared handle to
//! the master secret and turns plaintext field values into envelopes and
//! back:
//!
//! ```text
//! encrypt: plaintext -> (salt, iv) random -> derive_key -> seal -> Envelope::encode
//! decrypt: stored    -> Envelope::decode -> derive_key -> open -> UTF-8
//! ```
//!
//! Calls are independent of each other and touch no shared mutable state, so
//! a single `FieldCipher` can be cloned into as many threads as needed.

use std::fmt;
use std::sync::Arc;

use crate::crypto::{self, IV_LEN};
use crate::detect::{self, SafeDecryptResult};
use crate::envelope::Envelope;
use crate::error::FieldsealError;
use crate::keys::{self, MasterSecret, SALT_LEN};

/// Encrypts and decrypts individual field values under one master secret.
#[derive(Clone)]
pub struct FieldCipher {
    master: Arc<MasterSecret>,
}

impl FieldCipher {
    /// Take ownership of `master` and build a cipher around it.
    pub fn new(master: MasterSecret) -> Self {
        Self {
            master: Arc::new(master),
        }
    }

    /// Build from a master secret that is already shared elsewhere.
    pub fn from_shared(master: Arc<MasterSecret>) -> Self {
        Self { master }
    }

    /// Encrypt one field value into its stored envelope form.
    ///
    /// A fresh salt and IV are drawn on every call, so encrypting the same
    /// value twice yields two different envelopes. The empty string maps to
    /// the empty string, which optional fields rely on.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, FieldsealError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let salt = crypto::random_bytes::<SALT_LEN>()?;
        let iv = crypto::random_bytes::<IV_LEN>()?;
        let key = keys::derive_key(&self.master, &salt);
        let sealed = crypto::seal(&key, &iv, plaintext.as_bytes())?;

        let envelope = Envelope {
            salt,
            iv,
            tag: sealed.tag,
            ciphertext: sealed.ciphertext,
        };
        Ok(envelope.encode())
    }

    /// Strictly decrypt a stored envelope.
    ///
    /// Fails with `InvalidEnvelopeFormat` when `stored` is not envelope-shaped
    /// and with `AuthenticationFailed` when the tag does not verify. Read
    /// paths that may meet legacy plaintext use [`FieldCipher::safe_decrypt`].
    pub fn decrypt(&self, stored: &str) -> Result<String, FieldsealError> {
        if stored.is_empty() {
            return Ok(String::new());
        }

        let envelope = Envelope::decode(stored).map_err(FieldsealError::InvalidEnvelopeFormat)?;
        self.open_envelope(&envelope)
    }

    pub(crate) fn open_envelope(&self, envelope: &Envelope) -> Result<String, FieldsealError> {
        let key = keys::derive_key(&self.master, &envelope.salt);
        let plaintext = crypto::open(&key, &envelope.iv, &envelope.tag, &envelope.ciphertext)?;
        String::from_utf8(plaintext).map_err(|_| FieldsealError::Serialization)
    }

    /// Encrypt an optional field, leaving `None` as `None`.
    pub fn encrypt_optional(&self, value: Option<&str>) -> Result<Option<String>, FieldsealError> {
        value.map(|v| self.encrypt(v)).transpose()
    }

    /// Permissive decrypt for mixed legacy and encrypted data. Never fails.
    pub fn safe_decrypt(&self, input: &str) -> SafeDecryptResult {
        detect::safe_decrypt(self, input)
    }

    /// [`FieldCipher::safe_decrypt`] collapsed to the string a response carries.
    pub fn safe_decrypt_str(&self, input: &str) -> String {
        self.safe_decrypt(input).into_string()
    }

    /// Fingerprint of the master secret in use, safe to log.
    pub fn key_fingerprint(&self) -> String {
        self.master.fingerprint()
    }
}

impl fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCipher")
            .field("key_fingerprint", &self.key_fingerprint())
            .finish()
    }
}
