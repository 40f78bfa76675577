//! Stat-aware file identity index.
//!
//! Tracks files by `(inode, crtime-or-mtime)` so that an id survives
//! out-of-band renames and moves performed outside of this process (a shell
//! `mv`, a sibling tool, a filesystem-level operation the contents manager
//! never reported). Reconciliation happens lazily: on every lookup we
//! re-stat the path we have on file and, if it moved, chase the inode down
//! to its current location before answering.
//!
//! `path` is deliberately not unique in the `Files` table: after an
//! out-of-band move, the old path can be reoccupied by a brand new file
//! before anyone asks about the old record again, so both rows must be able
//! to coexist until the stale one is reconciled or deleted.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};

use crate::config::Config;
use crate::error::Result;
use crate::path::LocalPathNormalizer;
use crate::stat::{self, StatFingerprint};
use crate::store::local;

const SEP: char = std::path::MAIN_SEPARATOR;
const MAX_SYMLINK_DEPTH: u8 = 40;

pub struct LocalIndex {
    conn: Mutex<Connection>,
    normalizer: LocalPathNormalizer,
    autosync_interval_secs: i64,
    /// `None` until the first `sync_all`, matching upstream's "last sync at
    /// the epoch" so the very first `get_path` call always reconciles.
    last_sync: Mutex<Option<Instant>>,
}

impl LocalIndex {
    pub fn new(config: Config) -> Result<Self> {
        let normalizer = LocalPathNormalizer::new(&config.root_dir)?;
        let conn = local::open(&config.db_path, config.db_journal_mode)?;
        let index = Self {
            conn: Mutex::new(conn),
            normalizer,
            autosync_interval_secs: config.autosync_interval_secs,
            last_sync: Mutex::new(None),
        };
        index.index_all()?;
        Ok(index)
    }

    pub fn root_dir(&self) -> &Path {
        self.normalizer.root_dir()
    }

    /// Indexes `api_path`, associating a fresh id on first sight or
    /// recovering the existing one if the file was moved out of band.
    pub fn index(&self, api_path: &str) -> Result<Option<i64>> {
        tracing::debug!(path = %api_path, "indexing path");
        let path = self.normalizer.to_persisted(api_path);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let id = Self::index_in_tx(&tx, &self.normalizer, &path, 0)?;
        tx.commit()?;
        tracing::debug!(path = %api_path, id = ?id, "indexed path");
        Ok(id)
    }

    pub fn get_id(&self, api_path: &str) -> Result<Option<i64>> {
        tracing::debug!(path = %api_path, "looking up id for path");
        let path = self.normalizer.to_persisted(api_path);
        let Some(stat) = stat::lstat(&path) else {
            tracing::debug!(path = %api_path, "get_id found nothing on disk");
            return Ok(None);
        };
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let (id, _) = Self::sync_file(&tx, &path, &stat)?;
        tx.commit()?;
        tracing::debug!(path = %api_path, id = ?id, "resolved id for path");
        Ok(id)
    }

    /// Rate-limited reconciliation followed by a single read: `get_path`
    /// triggers at most one `sync_all` per call (gated by
    /// `autosync_interval_secs`), then answers from whatever the store
    /// holds afterward. A negative interval disables the sweep entirely, so
    /// a stale record simply reads as missing until someone calls
    /// `sync_all` explicitly.
    pub fn get_path(&self, id: i64) -> Result<Option<String>> {
        tracing::debug!(id, "looking up path for id");
        self.maybe_autosync()?;
        let path = self.get_path_once(id)?;
        tracing::debug!(id, path = ?path, "resolved path for id");
        Ok(path)
    }

    fn get_path_once(&self, id: i64) -> Result<Option<String>> {
        let record = {
            let conn = self.conn.lock();
            local::find_by_id(&conn, id)?
        };
        let Some(record) = record else {
            return Ok(None);
        };
        let path = PathBuf::from(&record.path);
        let Some(stat) = stat::lstat(&path) else {
            return Ok(None);
        };
        if stat.ino != record.ino || stat.identity_timestamp() != record.crtime.unwrap_or(record.mtime) {
            return Ok(None);
        }
        Ok(self.normalizer.from_persisted(&path).ok())
    }

    pub fn move_file(&self, old_api_path: &str, new_api_path: &str) -> Result<Option<i64>> {
        tracing::debug!(from = %old_api_path, to = %new_api_path, "moving path");
        let old_path = self.normalizer.to_persisted(old_api_path);
        let new_path = self.normalizer.to_persisted(new_api_path);
        let Some(stat) = stat::lstat(&new_path) else {
            tracing::debug!(to = %new_api_path, "move target missing on disk");
            return Ok(None);
        };

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let old_str = path_to_string(&old_path);
        let new_str = path_to_string(&new_path);

        let (found, _) = Self::sync_file(&tx, &new_path, &stat)?;
        let id = match found {
            Some(id) => id,
            None => match local::find_by_path(&tx, &old_str)? {
                Some(record) => {
                    if record.is_dir {
                        Self::move_recursive(&tx, &old_str, &new_str)?;
                    }
                    local::update_stat_and_path(&tx, record.id, &stat, &new_str)?;
                    record.id
                }
                None => local::create(&tx, &new_str, &stat)?,
            },
        };
        tx.commit()?;
        tracing::debug!(from = %old_api_path, to = %new_api_path, id, "moved path");
        Ok(Some(id))
    }

    /// Copies `from_path` to `to_path`, assigning the destination (and, for
    /// a directory, every descendant already materialized under it) a fresh
    /// id rather than reusing the source's.
    pub fn copy(&self, from_api_path: &str, to_api_path: &str) -> Result<Option<i64>> {
        tracing::debug!(from = %from_api_path, to = %to_api_path, "copying path");
        let from_path = self.normalizer.to_persisted(from_api_path);
        let to_path = self.normalizer.to_persisted(to_api_path);

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        if stat::lstat(&to_path).map(|s| s.is_dir).unwrap_or(false) {
            let from_str = path_to_string(&from_path);
            let to_str = path_to_string(&to_path);
            for descendant in local::find_descendants(&tx, &from_str, SEP)? {
                let Some(rel) = descendant.path.strip_prefix(&from_str) else {
                    continue;
                };
                let dest_path = format!("{to_str}{rel}");
                if let Some(child_stat) = stat::lstat(Path::new(&dest_path)) {
                    local::create(&tx, &dest_path, &child_stat)?;
                }
            }
        }

        Self::index_in_tx(&tx, &self.normalizer, &from_path, 0)?;
        let to_id = Self::index_in_tx(&tx, &self.normalizer, &to_path, 0)?;
        tx.commit()?;
        tracing::debug!(from = %from_api_path, to = %to_api_path, id = ?to_id, "copied path");
        Ok(to_id)
    }

    /// Deletes the record at `api_path`. If the path still denotes a
    /// directory at call time, every descendant record is removed too.
    pub fn delete(&self, api_path: &str) -> Result<()> {
        tracing::debug!(path = %api_path, "deleting path");
        let path = self.normalizer.to_persisted(api_path);
        let path_str = path_to_string(&path);
        let is_dir = stat::lstat(&path).map(|s| s.is_dir).unwrap_or(false);

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        if is_dir {
            local::delete_descendants(&tx, &path_str, SEP)?;
        }
        local::delete_by_path(&tx, &path_str)?;
        tx.commit()?;
        tracing::debug!(path = %api_path, "deleted path");
        Ok(())
    }

    /// Refreshes the stored stat for `api_path` after an in-band content
    /// change (a save through the contents manager, not an out-of-band
    /// write), without touching path or identity.
    pub fn save(&self, api_path: &str) -> Result<()> {
        tracing::debug!(path = %api_path, "saving path");
        let path = self.normalizer.to_persisted(api_path);
        let Some(stat) = stat::lstat(&path) else {
            tracing::debug!(path = %api_path, "save found nothing on disk");
            return Ok(());
        };
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        if let Some(record) = local::find_by_ino_and_path(&tx, stat.ino, &path_to_string(&path))? {
            local::update_stat(&tx, record.id, &stat)?;
        }
        tx.commit()?;
        tracing::debug!(path = %api_path, "saved path");
        Ok(())
    }

    /// Walks every tracked directory and reconciles its children against
    /// disk. Restarts the sweep whenever a directory move is discovered,
    /// since that invalidates paths read before the restart.
    pub fn sync_all(&self) -> Result<()> {
        tracing::debug!("running full reconciliation sweep");
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        Self::sync_all_in_tx(&tx)?;
        tx.commit()?;
        *self.last_sync.lock() = Some(Instant::now());
        tracing::debug!("reconciliation sweep complete");
        Ok(())
    }

    fn maybe_autosync(&self) -> Result<()> {
        if self.autosync_interval_secs < 0 {
            return Ok(());
        }
        let due = match *self.last_sync.lock() {
            None => true,
            Some(last) => {
                self.autosync_interval_secs == 0
                    || last.elapsed().as_secs_f64() >= self.autosync_interval_secs as f64
            }
        };
        if due {
            self.sync_all()?;
        }
        Ok(())
    }

    fn index_all(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        Self::index_dir_recursive(&tx, &self.normalizer, self.normalizer.root_dir())?;
        tx.commit()?;
        Ok(())
    }

    fn index_dir_recursive(tx: &Transaction, normalizer: &LocalPathNormalizer, dir_path: &Path) -> Result<()> {
        Self::index_in_tx(tx, normalizer, dir_path, 0)?;
        let Ok(entries) = fs::read_dir(dir_path) else {
            return Ok(());
        };
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                Self::index_dir_recursive(tx, normalizer, &entry.path())?;
            }
        }
        Ok(())
    }

    fn index_in_tx(
        tx: &Transaction,
        normalizer: &LocalPathNormalizer,
        path: &Path,
        depth: u8,
    ) -> Result<Option<i64>> {
        if depth > MAX_SYMLINK_DEPTH {
            return Ok(None);
        }
        let Some(stat) = stat::lstat(path) else {
            return Ok(None);
        };
        if stat.is_symlink {
            let Some(target) = resolve_symlink(path) else {
                return Ok(None);
            };
            let persisted = normalizer.to_persisted(&target);
            return Self::index_in_tx(tx, normalizer, &persisted, depth + 1);
        }
        let (id, _) = Self::sync_file(tx, path, &stat)?;
        if let Some(id) = id {
            return Ok(Some(id));
        }
        Ok(Some(local::create(tx, &path_to_string(path), &stat)?))
    }

    /// Associates `path` with its tracked record by matching `(ino,
    /// identity_timestamp)`, migrating any stale path (including, for a
    /// directory, every descendant) as a side effect. Returns `(id,
    /// directory_moved)`; a caller sweeping multiple directories uses the
    /// second value to know its directory listing is now stale.
    fn sync_file(tx: &Transaction, path: &Path, stat: &StatFingerprint) -> Result<(Option<i64>, bool)> {
        if stat.is_symlink {
            return Ok((None, false));
        }
        let Some(record) = local::find_by_ino(tx, stat.ino)? else {
            return Ok((None, false));
        };
        if record.crtime.unwrap_or(record.mtime) != stat.identity_timestamp() {
            local::delete_by_id(tx, record.id)?;
            return Ok((None, false));
        }

        let new_path_str = path_to_string(path);
        let mut directory_moved = false;
        if record.is_dir && record.path != new_path_str {
            Self::move_recursive(tx, &record.path, &new_path_str)?;
            directory_moved = true;
        }
        local::update_path(tx, record.id, &new_path_str)?;
        Ok((Some(record.id), directory_moved))
    }

    fn move_recursive(tx: &Transaction, old_path: &str, new_path: &str) -> Result<()> {
        for descendant in local::find_descendants(tx, old_path, SEP)? {
            let Some(rel) = descendant.path.strip_prefix(old_path) else {
                continue;
            };
            local::update_path(tx, descendant.id, &format!("{new_path}{rel}"))?;
        }
        Ok(())
    }

    /// Re-stats every child of `dir_path` and reconciles it. Returns
    /// whether any child directory turned out to have moved.
    fn sync_dir(tx: &Transaction, dir_path: &Path) -> Result<bool> {
        let mut directory_moved = false;
        let Ok(entries) = fs::read_dir(dir_path) else {
            return Ok(false);
        };
        for entry in entries {
            let entry = entry?;
            let child_path = entry.path();
            let Some(stat) = stat::lstat(&child_path) else {
                continue;
            };
            let (id, moved) = Self::sync_file(tx, &child_path, &stat)?;
            directory_moved |= moved;
            if stat.is_dir && id.is_none() {
                local::create(tx, &path_to_string(&child_path), &stat)?;
                directory_moved |= Self::sync_dir(tx, &child_path)?;
            }
        }
        Ok(directory_moved)
    }

    fn sync_all_in_tx(tx: &Transaction) -> Result<()> {
        loop {
            let mut restart = false;
            for record in local::all_dirs(tx)? {
                let path = PathBuf::from(&record.path);
                let Some(stat) = stat::lstat(&path) else {
                    continue;
                };
                if stat.mtime == record.mtime {
                    continue;
                }
                let moved = Self::sync_dir(tx, &path)?;
                // Re-indexing (rather than a bare sync_file) ensures the
                // directory's own row is restored even when it just got
                // deleted above by an identity mismatch on its mtime.
                local::create_or_refresh(tx, &path_to_string(&path), &stat)?;
                if moved {
                    restart = true;
                    break;
                }
            }
            if !restart {
                break;
            }
        }
        Ok(())
    }
}

fn resolve_symlink(path: &Path) -> Option<PathBuf> {
    let target = fs::read_link(path).ok()?;
    Some(if target.is_absolute() {
        target
    } else {
        path.parent().unwrap_or_else(|| Path::new("")).join(target)
    })
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use std::fs;
    use tempfile::tempdir;

    fn new_index(root: &Path) -> LocalIndex {
        let config = Config::local(root.to_str().unwrap(), ":memory:").unwrap();
        LocalIndex::new(config).unwrap()
    }

    fn touch_dir(path: &Path) {
        fs::create_dir_all(path).unwrap();
    }

    fn bump_mtime(path: &Path) {
        let now = FileTime::now();
        let bumped = FileTime::from_unix_time(now.unix_seconds() + 1, 0);
        set_file_mtime(path, bumped).unwrap();
    }

    #[test]
    fn index_is_stable_across_reindex() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a"), b"hi").unwrap();
        let index = new_index(dir.path());

        let id = index.index("a").unwrap().unwrap();
        assert_eq!(index.index("a").unwrap(), Some(id));
    }

    #[test]
    fn directory_rename_preserves_id() {
        let dir = tempdir().unwrap();
        touch_dir(&dir.path().join("old"));
        let index = new_index(dir.path());
        let id = index.index("old").unwrap().unwrap();

        fs::rename(dir.path().join("old"), dir.path().join("new")).unwrap();
        bump_mtime(dir.path());

        assert_eq!(index.get_id("new").unwrap(), Some(id));
        assert_eq!(index.get_path(id).unwrap(), Some("new".to_string()));
    }

    #[test]
    fn nested_directory_move_preserves_descendant_ids() {
        let dir = tempdir().unwrap();
        touch_dir(&dir.path().join("old"));
        touch_dir(&dir.path().join("old/child"));
        fs::write(dir.path().join("old/child/leaf"), b"x").unwrap();

        let index = new_index(dir.path());
        let parent_id = index.index("old").unwrap().unwrap();
        let child_id = index.index("old/child").unwrap().unwrap();
        let leaf_id = index.index("old/child/leaf").unwrap().unwrap();

        fs::rename(dir.path().join("old"), dir.path().join("new")).unwrap();
        bump_mtime(dir.path());

        assert_eq!(index.get_id("new").unwrap(), Some(parent_id));
        assert_eq!(index.get_id("new/child").unwrap(), Some(child_id));
        assert_eq!(index.get_id("new/child/leaf").unwrap(), Some(leaf_id));
    }

    #[test]
    fn disjoint_move_reuses_id_by_explicit_call() {
        let dir = tempdir().unwrap();
        touch_dir(&dir.path().join("old"));
        let index = new_index(dir.path());
        let old_id = index.index("old").unwrap().unwrap();

        // Allocate "new"'s inode before freeing "old"'s, so the allocator
        // can't hand out the same inode number for both (which would make
        // this indistinguishable from an ordinary tracked move).
        touch_dir(&dir.path().join("new"));
        fs::remove_dir(dir.path().join("old")).unwrap();

        let new_id = index.move_file("old", "new").unwrap().unwrap();
        assert_eq!(old_id, new_id);
    }

    #[test]
    fn new_file_at_old_path_gets_its_own_id() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("old"), b"a").unwrap();
        let index = new_index(dir.path());
        let old_id = index.index("old").unwrap().unwrap();

        fs::rename(dir.path().join("old"), dir.path().join("new")).unwrap();
        fs::write(dir.path().join("old"), b"b").unwrap();
        let other_id = index.index("old").unwrap().unwrap();

        assert_ne!(old_id, other_id);
        assert_eq!(index.get_id("new").unwrap(), Some(old_id));
        assert_eq!(index.get_path(old_id).unwrap(), Some("new".to_string()));
        assert_eq!(index.get_id("old").unwrap(), Some(other_id));
    }

    #[test]
    fn copy_assigns_fresh_id() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("old"), b"a").unwrap();
        let index = new_index(dir.path());
        let old_id = index.index("old").unwrap().unwrap();

        fs::copy(dir.path().join("old"), dir.path().join("new")).unwrap();
        let new_id = index.copy("old", "new").unwrap().unwrap();

        assert_ne!(old_id, new_id);
    }

    #[test]
    fn delete_clears_lookup() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a"), b"x").unwrap();
        let index = new_index(dir.path());
        let id = index.index("a").unwrap().unwrap();

        fs::remove_file(dir.path().join("a")).unwrap();
        index.delete("a").unwrap();

        assert_eq!(index.get_id("a").unwrap(), None);
        assert_eq!(index.get_path(id).unwrap(), None);
    }

    #[test]
    fn negative_autosync_interval_disables_sync_all_on_get_path() {
        let dir = tempdir().unwrap();
        touch_dir(&dir.path().join("old"));
        let config = Config::local(dir.path().to_str().unwrap(), ":memory:")
            .unwrap()
            .with_autosync_interval_secs(-1);
        let index = LocalIndex::new(config).unwrap();
        let id = index.index("old").unwrap().unwrap();

        fs::rename(dir.path().join("old"), dir.path().join("new")).unwrap();
        bump_mtime(dir.path());

        // Autosync disabled: get_path never sweeps, so the stale record at
        // "old" (now gone from disk) reads as missing until a manual sync_all.
        assert_eq!(index.get_path(id).unwrap(), None);
        index.sync_all().unwrap();
        assert_eq!(index.get_path(id).unwrap(), Some("new".to_string()));
    }

    #[test]
    fn zero_autosync_interval_always_reconciles_on_get_path() {
        let dir = tempdir().unwrap();
        touch_dir(&dir.path().join("old"));
        let config = Config::local(dir.path().to_str().unwrap(), ":memory:")
            .unwrap()
            .with_autosync_interval_secs(0);
        let index = LocalIndex::new(config).unwrap();
        let id = index.index("old").unwrap().unwrap();

        fs::rename(dir.path().join("old"), dir.path().join("new")).unwrap();
        bump_mtime(dir.path());

        assert_eq!(index.get_path(id).unwrap(), Some("new".to_string()));
    }
}
