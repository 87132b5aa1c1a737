//! Manifest records and checksums.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ManifestParseError;

/// CRC-32 content checksum (zlib/gzip polynomial).
///
/// Rendered as 8 uppercase, zero-padded hex digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum(pub u32);

impl Checksum {
    /// Create a checksum from a raw CRC-32 value.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Raw CRC-32 value.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl FromStr for Checksum {
    type Err = ManifestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ManifestParseError::InvalidChecksum {
            value: s.to_string(),
        };
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        u32::from_str_radix(s, 16).map(Self).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Checksum {
    type Error = ManifestParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.to_string()
    }
}

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the walk root.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Content checksum.
    pub checksum: Checksum,
}

impl FileRecord {
    /// Create a new record.
    pub fn new(path: impl Into<PathBuf>, size: u64, checksum: Checksum) -> Self {
        Self {
            path: path.into(),
            size,
            checksum,
        }
    }
}

/// Formats the record as a manifest line: `path,size,checksum`.
impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.path.display(), self.size, self.checksum)
    }
}

/// Parses a manifest line. The path may itself contain commas.
impl FromStr for FileRecord {
    type Err = ManifestParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.rsplitn(3, ',');
        let (Some(checksum), Some(size), Some(path)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(ManifestParseError::MissingField {
                line: line.to_string(),
            });
        };
        if path.is_empty() {
            return Err(ManifestParseError::MissingField {
                line: line.to_string(),
            });
        }

        let size = size.parse().map_err(|_| ManifestParseError::InvalidSize {
            value: size.to_string(),
        })?;

        Ok(Self {
            path: PathBuf::from(path),
            size,
            checksum: checksum.parse()?,
        })
    }
}
