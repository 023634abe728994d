//! BIP32 derivation paths as the wallet app expects them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Tezos account 0, used whenever a request names no path
pub const DEFAULT_DERIVATION_PATH: &str = "44'/1729'/0'/0'";

const MAX_DEPTH: usize = 10;
const HARDENED: u32 = 0x8000_0000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Empty derivation path")]
    Empty,

    #[error("Derivation path too deep: {0} components (max 10)")]
    TooDeep(usize),

    #[error("Invalid path component: {0:?}")]
    InvalidComponent(String),
}

/// Validated path string, kept in the `44'/1729'/0'/0'` form the app library parses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DerivationPath(String);

impl DerivationPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let trimmed = raw.trim();
        let body = trimmed.strip_prefix("m/").unwrap_or(trimmed);
        if body.is_empty() || body == "m" {
            return Err(PathError::Empty);
        }

        let parts: Vec<&str> = body.split('/').collect();
        if parts.len() > MAX_DEPTH {
            return Err(PathError::TooDeep(parts.len()));
        }
        for part in &parts {
            parse_component(part)?;
        }
        Ok(Self(body.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric indices with the hardened bit applied
    pub fn indices(&self) -> Vec<u32> {
        self.0.split('/').filter_map(|p| parse_component(p).ok()).collect()
    }
}

fn parse_component(part: &str) -> Result<u32, PathError> {
    let invalid = || PathError::InvalidComponent(part.to_string());
    let (digits, hardened) = match part.strip_suffix('\'') {
        Some(d) => (d, true),
        None => (part, false),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let index: u32 = digits.parse().map_err(|_| invalid())?;
    if index >= HARDENED {
        return Err(invalid());
    }
    Ok(if hardened { index | HARDENED } else { index })
}

impl Default for DerivationPath {
    fn default() -> Self {
        Self(DEFAULT_DERIVATION_PATH.to_string())
    }
}

impl FromStr for DerivationPath {
    type Err = PathError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl TryFrom<String> for DerivationPath {
    type Error = PathError;
    fn try_from(s: String) -> Result<Self, Self::Error> { Self::parse(&s) }
}

impl From<DerivationPath> for String {
    fn from(p: DerivationPath) -> Self { p.0 }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
