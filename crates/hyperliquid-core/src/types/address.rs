//! Wallet address parsing and canonicalization.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Number of hex digits after the `0x` prefix.
const ADDRESS_HEX_LEN: usize = 40;

/// An EVM-style wallet address.
///
/// Equality, ordering and hashing use the canonical (lower-case) form only.
/// The display form keeps the casing the address was first seen with.
#[derive(Debug, Clone)]
pub struct WalletAddress {
    canonical: String,
    display: String,
}

impl WalletAddress {
    /// Parse and validate a raw address string.
    ///
    /// Accepts `0x`/`0X` followed by exactly 40 hex digits, ignoring
    /// surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| Error::InvalidAddress(raw.to_string()))?;

        if hex.len() != ADDRESS_HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidAddress(raw.to_string()));
        }

        Ok(Self {
            canonical: format!("0x{}", hex.to_ascii_lowercase()),
            display: trimmed.to_string(),
        })
    }

    /// Lower-case form used as the deduplication key.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Original casing of the first observation.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Shortened form for log lines (`0xabcdef12…`).
    pub fn short(&self) -> &str {
        &self.canonical[..10]
    }
}

impl PartialEq for WalletAddress {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for WalletAddress {}

impl Hash for WalletAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for WalletAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WalletAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl std::str::FromStr for WalletAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for WalletAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}

impl<'de> Deserialize<'de> for WalletAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
