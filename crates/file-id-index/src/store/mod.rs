//! Embedded relational store backing the file identity index.
//!
//! One SQLite connection per [`crate::FileIdIndex`] instance, held behind a
//! mutex so the "helpers don't commit, callers commit once" discipline holds
//! even if the index is shared across async tasks. See [`local`] and
//! [`arbitrary`] for the two schemas.

pub mod arbitrary;
pub mod local;

use std::str::FromStr;

use crate::error::{FileIdError, Result};

/// SQLite journaling mode, mirroring `PRAGMA journal_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    Wal,
    Off,
}

impl JournalMode {
    pub fn as_pragma_value(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Persist => "PERSIST",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
            Self::Off => "OFF",
        }
    }
}

impl FromStr for JournalMode {
    type Err = FileIdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DELETE" => Ok(Self::Delete),
            "TRUNCATE" => Ok(Self::Truncate),
            "PERSIST" => Ok(Self::Persist),
            "MEMORY" => Ok(Self::Memory),
            "WAL" => Ok(Self::Wal),
            "OFF" => Ok(Self::Off),
            other => Err(FileIdError::InvalidJournalMode(other.to_string())),
        }
    }
}

/// Validates a configured `db_path`: must be absolute, or the in-memory sentinel.
pub fn validate_db_path(db_path: &str) -> Result<()> {
    if db_path == ":memory:" || std::path::Path::new(db_path).is_absolute() {
        Ok(())
    } else {
        Err(FileIdError::DbPathInvalid(db_path.to_string()))
    }
}

/// Builds a GLOB pattern matching direct and indirect descendants of `prefix`
/// under the given persisted-path separator, escaping GLOB metacharacters
/// (`*`, `?`, `[`) that may appear in the prefix itself.
pub fn descendant_glob(prefix: &str, sep: char) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 2);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']') {
            escaped.push('[');
            escaped.push(ch);
            escaped.push(']');
        } else {
            escaped.push(ch);
        }
    }
    escaped.push(sep);
    escaped.push('*');
    escaped
}
