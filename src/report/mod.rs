//! # Popcorn Report Format
//!
//! Typed representation of the line-oriented report a popcorn client uploads:
//!
//! ```text
//! popcorn 0.1 x86_64 33d08e56f1d2748bc7d056375042dcd1336a7635fdc1cec159bedacfce9c2c4f
//! v sed 4.2.1 5.1.2 x86_64 openSUSE
//! ```
//!
//! The first line is the header; every following line describes one
//! installed package and how recently it was used.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

mod parser;

pub use parser::{PROTOCOL_TAG, parse_report};

/// Usage classification of a reported package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    /// Files of the package were accessed recently (`v`)
    Voted,
    /// The package was installed or upgraded recently (`r`)
    Recent,
    /// The package has not been used for a while (`o`)
    Old,
    /// The package installs no files worth tracking (`n`)
    #[serde(rename = "nofiles")]
    NoFiles,
}

impl PackageStatus {
    pub const ALL: [PackageStatus; 4] = [
        PackageStatus::Voted,
        PackageStatus::Recent,
        PackageStatus::Old,
        PackageStatus::NoFiles,
    ];

    /// Parse the single-letter wire code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "v" => Some(Self::Voted),
            "r" => Some(Self::Recent),
            "o" => Some(Self::Old),
            "n" => Some(Self::NoFiles),
            _ => None,
        }
    }

    /// Single-letter wire code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Voted => "v",
            Self::Recent => "r",
            Self::Old => "o",
            Self::NoFiles => "n",
        }
    }

    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voted => "voted",
            Self::Recent => "recent",
            Self::Old => "old",
            Self::NoFiles => "nofiles",
        }
    }

    /// Inverse of [`PackageStatus::as_str`].
    pub fn from_stored(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed first line of a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader {
    pub protocol_tag: String,
    pub protocol_version: String,
    pub arch: String,
    pub hw_uuid: String,
}

/// Parsed package line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// 1-based line number in the payload
    pub line: usize,
    pub status: PackageStatus,
    pub name: String,
    pub version: String,
    pub release: String,
    pub arch: String,
    /// Remainder of the line; may contain spaces
    pub vendor: String,
}

/// A fully parsed report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub header: ParsedHeader,
    pub lines: Vec<ParsedLine>,
}

/// Reasons a report is rejected as malformed.
///
/// Any of these rejects the whole report; nothing from it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Format error: empty submission")]
    Empty,
    #[error("Format error: submission is not valid UTF-8 text")]
    InvalidEncoding,
    #[error("Format error: submission exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("Format error: header must have 4 fields, found {found}")]
    HeaderFieldCount { found: usize },
    #[error("Format error: unexpected protocol tag '{tag}'")]
    ProtocolTag { tag: String },
    #[error("Format error on line {line}: expected 6 fields, found {found}")]
    LineFieldCount { line: usize, found: usize },
    #[error("Format error on line {line}: unrecognized status '{status}'")]
    UnknownStatus { line: usize, status: String },
}
