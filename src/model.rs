//! Person records and their sensitive fields.
//!
//! Four collections of people carry regulated personal data. Each may hold a
//! CPF, a phone number and an address, all stored as opaque strings that are
//! either legacy plaintext or an envelope.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cipher::FieldCipher;
use crate::detect::{self, FieldFormat};
use crate::error::FieldsealError;

/// A persisted collection of person records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Students,
    Teachers,
    Staff,
    AdminTeam,
}

impl Collection {
    /// Migration order.
    pub const ALL: [Collection; 4] = [
        Collection::Students,
        Collection::Teachers,
        Collection::Staff,
        Collection::AdminTeam,
    ];

    /// Backing table name.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Students => "students",
            Self::Teachers => "teachers",
            Self::Staff => "staff",
            Self::AdminTeam => "admin_team",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// A field holding regulated personal data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitiveField {
    Cpf,
    Phone,
    Address,
}

impl SensitiveField {
    pub const ALL: [SensitiveField; 3] = [
        SensitiveField::Cpf,
        SensitiveField::Phone,
        SensitiveField::Address,
    ];

    /// Backing column name.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Cpf => "cpf",
            Self::Phone => "phone",
            Self::Address => "address",
        }
    }
}

impl fmt::Display for SensitiveField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// The sensitive fields of one person, as stored or as revealed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveFields {
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl SensitiveFields {
    pub fn get(&self, field: SensitiveField) -> Option<&str> {
        match field {
            SensitiveField::Cpf => self.cpf.as_deref(),
            SensitiveField::Phone => self.phone.as_deref(),
            SensitiveField::Address => self.address.as_deref(),
        }
    }

    pub fn set(&mut self, field: SensitiveField, value: Option<String>) {
        match field {
            SensitiveField::Cpf => self.cpf = value,
            SensitiveField::Phone => self.phone = value,
            SensitiveField::Address => self.address = value,
        }
    }

    /// Write path: encrypt every present value that is still plaintext.
    ///
    /// Values that are already envelopes are kept as they are, so re-saving
    /// a record loaded from storage never double-encrypts.
    pub fn seal(&self, cipher: &FieldCipher) -> Result<SensitiveFields, FieldsealError> {
        let mut sealed = self.clone();
        for field in SensitiveField::ALL {
            if let Some(value) = self.get(field) {
                if detect::classify(value) == FieldFormat::LegacyPlaintext {
                    sealed.set(field, Some(cipher.encrypt(value)?));
                }
            }
        }
        Ok(sealed)
    }

    /// Read path: safe-decrypt every present value for a response.
    pub fn reveal(&self, cipher: &FieldCipher) -> SensitiveFields {
        let mut revealed = SensitiveFields::default();
        for field in SensitiveField::ALL {
            revealed.set(field, self.get(field).map(|v| cipher.safe_decrypt_str(v)));
        }
        revealed
    }
}

/// A stored person record, reduced to what the migration needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonRecord {
    pub id: String,
    pub fields: SensitiveFields,
}

/// One staged column rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    pub field: SensitiveField,
    pub value: String,
}
