//! Fingerprints for exported schemas

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA256 over the canonical JSON of a value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(data)))
    }

    /// Serialize `value` through `serde_json::Value` (sorted object keys) and hash it
    pub fn of<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        let canonical = serde_json::to_value(value)?;
        Ok(Self::from_bytes(serde_json::to_string(&canonical)?.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `value` hashes to this checksum
    pub fn matches<T: Serialize>(&self, value: &T) -> bool {
        Self::of(value).is_ok_and(|c| c == *self)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
