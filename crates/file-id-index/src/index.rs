//! The sealed backend dispatcher.
//!
//! [`LocalIndex`] and [`ArbitraryIndex`] share an operation set but not a
//! representation: local ids are database row ids, arbitrary ids are UUID
//! strings. Rather than a trait object (which would force both down to a
//! common vtable for no real benefit, since the set of implementations is
//! closed), `FileIdIndex` is a tagged enum — callers get one concrete type
//! back regardless of backend, with ids always surfaced as opaque strings.

use crate::arbitrary_index::ArbitraryIndex;
use crate::config::{Backend, Config};
use crate::error::Result;
use crate::local_index::LocalIndex;

pub enum FileIdIndex {
    Local(LocalIndex),
    Arbitrary(ArbitraryIndex),
}

impl FileIdIndex {
    pub fn open(config: Config) -> Result<Self> {
        Ok(match config.backend {
            Backend::Local => Self::Local(LocalIndex::new(config)?),
            Backend::Arbitrary => Self::Arbitrary(ArbitraryIndex::new(config)?),
        })
    }

    pub fn index(&self, path: &str) -> Result<Option<String>> {
        match self {
            Self::Local(index) => Ok(index.index(path)?.map(|id| id.to_string())),
            Self::Arbitrary(index) => index.index(path),
        }
    }

    pub fn get_id(&self, path: &str) -> Result<Option<String>> {
        match self {
            Self::Local(index) => Ok(index.get_id(path)?.map(|id| id.to_string())),
            Self::Arbitrary(index) => index.get_id(path),
        }
    }

    pub fn get_path(&self, id: &str) -> Result<Option<String>> {
        match self {
            Self::Local(index) => match id.parse::<i64>() {
                Ok(id) => index.get_path(id),
                Err(_) => Ok(None),
            },
            Self::Arbitrary(index) => index.get_path(id),
        }
    }

    pub fn move_file(&self, old_path: &str, new_path: &str) -> Result<Option<String>> {
        match self {
            Self::Local(index) => Ok(index.move_file(old_path, new_path)?.map(|id| id.to_string())),
            Self::Arbitrary(index) => index.move_file(old_path, new_path),
        }
    }

    pub fn copy(&self, from_path: &str, to_path: &str) -> Result<Option<String>> {
        match self {
            Self::Local(index) => Ok(index.copy(from_path, to_path)?.map(|id| id.to_string())),
            Self::Arbitrary(index) => index.copy(from_path, to_path),
        }
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        match self {
            Self::Local(index) => index.delete(path),
            Self::Arbitrary(index) => index.delete(path),
        }
    }

    pub fn save(&self, path: &str) -> Result<()> {
        match self {
            Self::Local(index) => index.save(path),
            Self::Arbitrary(index) => index.save(path),
        }
    }

    /// Forces a full reconciliation sweep. A no-op on the arbitrary
    /// backend, which has nothing to reconcile against.
    pub fn sync_all(&self) -> Result<()> {
        match self {
            Self::Local(index) => index.sync_all(),
            Self::Arbitrary(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn local_backend_round_trips_through_string_ids() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"x").unwrap();
        let config = Config::local(dir.path().to_str().unwrap(), ":memory:").unwrap();
        let index = FileIdIndex::open(config).unwrap();

        let id = index.index("a").unwrap().unwrap();
        assert!(id.parse::<i64>().is_ok());
        assert_eq!(index.get_path(&id).unwrap(), Some("a".to_string()));
    }

    #[test]
    fn arbitrary_backend_round_trips_through_string_ids() {
        let config = Config::arbitrary("", ":memory:").unwrap();
        let index = FileIdIndex::open(config).unwrap();

        let id = index.index("a/b").unwrap().unwrap();
        assert_eq!(index.get_path(&id).unwrap(), Some("a/b".to_string()));
        index.sync_all().unwrap();
    }
}
