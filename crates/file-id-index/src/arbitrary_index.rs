//! Stat-free file identity index.
//!
//! Treats the filesystem as opaque (or unreachable, e.g. object storage):
//! the persisted path is authoritative and only changes in direct response
//! to an API call or a host event. There is no reconciliation pass because
//! there is nothing to reconcile against.

use rusqlite::Connection;
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::path::ArbitraryPathNormalizer;
use crate::store::arbitrary;

const SEP: char = '/';

pub struct ArbitraryIndex {
    conn: parking_lot::Mutex<Connection>,
    normalizer: ArbitraryPathNormalizer,
}

impl ArbitraryIndex {
    pub fn new(config: Config) -> Result<Self> {
        let conn = arbitrary::open(&config.db_path, config.db_journal_mode)?;
        Ok(Self {
            conn: parking_lot::Mutex::new(conn),
            normalizer: ArbitraryPathNormalizer::new(config.root_dir),
        })
    }

    pub fn index(&self, api_path: &str) -> Result<Option<String>> {
        tracing::debug!(path = %api_path, "indexing path");
        let path = self.normalizer.to_persisted(api_path);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let id = if let Some(id) = arbitrary::find_id_by_path(&tx, &path)? {
            id
        } else {
            let id = Uuid::new_v4().to_string();
            arbitrary::create(&tx, &id, &path)?;
            id
        };
        tx.commit()?;
        tracing::debug!(path = %api_path, id = %id, "indexed path");
        Ok(Some(id))
    }

    pub fn get_id(&self, api_path: &str) -> Result<Option<String>> {
        let path = self.normalizer.to_persisted(api_path);
        let conn = self.conn.lock();
        arbitrary::find_id_by_path(&conn, &path)
    }

    pub fn get_path(&self, id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let Some(path) = arbitrary::find_path_by_id(&conn, id)? else {
            return Ok(None);
        };
        Ok(self.normalizer.from_persisted(&path).ok())
    }

    /// Rewrites `old_path` to `new_path`, carrying every descendant along
    /// via a prefix scan. If `old_path` was never indexed, a fresh record
    /// is created at `new_path` instead (move-as-rename is not assumed).
    pub fn move_file(&self, old_api_path: &str, new_api_path: &str) -> Result<Option<String>> {
        tracing::debug!(from = %old_api_path, to = %new_api_path, "moving path");
        let old_path = self.normalizer.to_persisted(old_api_path);
        let new_path = self.normalizer.to_persisted(new_api_path);

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let id = match arbitrary::find_id_by_path(&tx, &old_path)? {
            Some(id) => {
                for (descendant_id, descendant_path) in arbitrary::find_descendants(&tx, &old_path, SEP)? {
                    let Some(rel) = descendant_path.strip_prefix(&old_path) else {
                        continue;
                    };
                    arbitrary::update_path_by_id(&tx, &descendant_id, &format!("{new_path}{rel}"))?;
                }
                arbitrary::update_path(&tx, &old_path, &new_path)?;
                id
            }
            None => {
                let id = Uuid::new_v4().to_string();
                arbitrary::create(&tx, &id, &new_path)?;
                id
            }
        };
        tx.commit()?;
        tracing::debug!(from = %old_api_path, to = %new_api_path, id = %id, "moved path");
        Ok(Some(id))
    }

    /// Creates a fresh record at `to_path`, and a fresh record (with its
    /// own fresh id, never the source's) for every existing descendant of
    /// `from_path`, mirrored under `to_path`.
    pub fn copy(&self, from_api_path: &str, to_api_path: &str) -> Result<Option<String>> {
        tracing::debug!(from = %from_api_path, to = %to_api_path, "copying path");
        let from_path = self.normalizer.to_persisted(from_api_path);
        let to_path = self.normalizer.to_persisted(to_api_path);

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for (_, descendant_path) in arbitrary::find_descendants(&tx, &from_path, SEP)? {
            let Some(rel) = descendant_path.strip_prefix(&from_path) else {
                continue;
            };
            arbitrary::create(&tx, &Uuid::new_v4().to_string(), &format!("{to_path}{rel}"))?;
        }
        let id = Uuid::new_v4().to_string();
        arbitrary::create(&tx, &id, &to_path)?;
        tx.commit()?;
        tracing::debug!(from = %from_api_path, to = %to_api_path, id = %id, "copied path");
        Ok(Some(id))
    }

    pub fn delete(&self, api_path: &str) -> Result<()> {
        tracing::debug!(path = %api_path, "deleting path");
        let path = self.normalizer.to_persisted(api_path);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        arbitrary::delete_descendants(&tx, &path, SEP)?;
        arbitrary::delete_by_path(&tx, &path)?;
        tx.commit()?;
        tracing::debug!(path = %api_path, "deleted path");
        Ok(())
    }

    /// No-op: the arbitrary backend has no stat to refresh.
    pub fn save(&self, _api_path: &str) -> Result<()> {
        Ok(())
    }
}
