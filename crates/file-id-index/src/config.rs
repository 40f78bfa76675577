//! Configuration for a file identity index instance.
//!
//! Validated eagerly so that a misconfigured `root_dir`/`db_path` surfaces
//! before the store is opened, not as a panic mid-request.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Result;
use crate::store::{validate_db_path, JournalMode};

/// Which index backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Stat-aware backend for real, locally mounted filesystems.
    Local,
    /// Stat-free backend for arbitrary (possibly unreachable) filesystems.
    #[default]
    Arbitrary,
}

/// Validated configuration shared by both index backends.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    /// Absolute OS path (local) or arbitrary root string (arbitrary).
    pub root_dir: String,
    /// Absolute path, or `":memory:"`.
    pub db_path: String,
    pub db_journal_mode: JournalMode,
    /// Local backend only: autosync rate limit, in seconds, for `get_path`.
    /// Negative disables autosync; zero forces a sync on every call.
    pub autosync_interval_secs: i64,
}

impl Config {
    /// Builds and validates a config for the local backend.
    pub fn local(root_dir: impl Into<String>, db_path: impl Into<String>) -> Result<Self> {
        let root_dir = root_dir.into();
        if !PathBuf::from(&root_dir).is_absolute() {
            return Err(crate::error::FileIdError::PathInvalid(PathBuf::from(root_dir)));
        }
        let db_path = db_path.into();
        validate_db_path(&db_path)?;
        Ok(Self {
            backend: Backend::Local,
            root_dir,
            db_path,
            db_journal_mode: JournalMode::Wal,
            autosync_interval_secs: 5,
        })
    }

    /// Builds and validates a config for the arbitrary backend. `root_dir`
    /// may be any string, including empty.
    pub fn arbitrary(root_dir: impl Into<String>, db_path: impl Into<String>) -> Result<Self> {
        let db_path = db_path.into();
        validate_db_path(&db_path)?;
        Ok(Self {
            backend: Backend::Arbitrary,
            root_dir: root_dir.into(),
            db_path,
            db_journal_mode: JournalMode::Delete,
            autosync_interval_secs: 5,
        })
    }

    pub fn with_journal_mode(mut self, mode: JournalMode) -> Self {
        self.db_journal_mode = mode;
        self
    }

    pub fn with_autosync_interval_secs(mut self, secs: i64) -> Self {
        self.autosync_interval_secs = secs;
        self
    }
}

impl FromStr for Backend {
    type Err = crate::error::FileIdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            _ => Ok(Self::Arbitrary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_requires_absolute_root() {
        assert!(Config::local("relative", ":memory:").is_err());
        assert!(Config::local("/abs", ":memory:").is_ok());
    }

    #[test]
    fn arbitrary_defaults_to_delete_journaling() {
        let config = Config::arbitrary("", ":memory:").unwrap();
        assert_eq!(config.db_journal_mode.as_pragma_value(), "DELETE");
    }

    #[test]
    fn local_defaults_to_wal_journaling() {
        let config = Config::local("/abs", ":memory:").unwrap();
        assert_eq!(config.db_journal_mode.as_pragma_value(), "WAL");
    }
}
