//! PII redaction via SHA-256.
//!
//! Email addresses, phone numbers and names are replaced by lowercase hex
//! SHA-256 digests before they are stored or sent to the ad platform.
//! Absent or empty input never produces a digest, so records without an
//! email do not all collapse onto the hash of `""`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::normalization::CanonicalLead;

/// How input text is prepared before hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashNormalization {
    /// Trim surrounding whitespace and lower-case, so `" A@B.com "` and
    /// `"a@b.com"` share a digest. This is what the ad platform expects.
    #[default]
    TrimLowercase,
    /// Hash the value byte-for-byte as received.
    Raw,
}

impl HashNormalization {
    pub const fn as_str(self) -> &'static str {
        match self {
            HashNormalization::TrimLowercase => "trim_lowercase",
            HashNormalization::Raw => "raw",
        }
    }

    fn prepare(self, value: &str) -> String {
        match self {
            HashNormalization::TrimLowercase => value.trim().to_lowercase(),
            HashNormalization::Raw => value.to_string(),
        }
    }
}

impl fmt::Display for HashNormalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashNormalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trim_lowercase" => Ok(HashNormalization::TrimLowercase),
            "raw" => Ok(HashNormalization::Raw),
            other => Err(other.to_string()),
        }
    }
}

/// Hash a PII value, returning `None` for absent or empty input.
pub fn hash_pii(value: Option<&str>, normalization: HashNormalization) -> Option<String> {
    let prepared = normalization.prepare(value?);
    if prepared.is_empty() {
        return None;
    }

    let digest = Sha256::digest(prepared.as_bytes());
    Some(hex::encode(digest))
}

/// Digests derived from a canonical lead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashedFields {
    pub email_hash: Option<String>,
    pub phone_hash: Option<String>,
    pub first_name_hash: Option<String>,
    pub last_name_hash: Option<String>,
}

/// Applies one normalization policy to every redacted field.
#[derive(Debug, Clone, Copy, Default)]
pub struct Redactor {
    normalization: HashNormalization,
}

impl Redactor {
    pub fn new(normalization: HashNormalization) -> Self {
        Self { normalization }
    }

    pub fn hash(&self, value: Option<&str>) -> Option<String> {
        hash_pii(value, self.normalization)
    }

    pub fn redact_lead(&self, lead: &CanonicalLead) -> HashedFields {
        HashedFields {
            email_hash: self.hash(lead.email.as_deref()),
            phone_hash: self.hash(lead.mobile.as_deref()),
            first_name_hash: self.hash(Some(&lead.first_name)),
            last_name_hash: self.hash(Some(&lead.last_name)),
        }
    }
}
