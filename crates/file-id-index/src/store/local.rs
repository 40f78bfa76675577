//! SQLite-backed store for the local (stat-aware) file identity backend.
//!
//! Schema: a single `Files` table keyed by auto-increment `id`, with a
//! `path` index and an `is_dir` index, plus a uniqueness constraint on `ino`
//! (see module docs on [`crate::local_index`] for why `path` is deliberately
//! NOT unique).

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::stat::StatFingerprint;
use crate::store::{descendant_glob, JournalMode};

const CREATE_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS Files(
        id     INTEGER PRIMARY KEY AUTOINCREMENT,
        path   TEXT NOT NULL,
        ino    INTEGER NOT NULL UNIQUE,
        crtime INTEGER,
        mtime  INTEGER NOT NULL,
        is_dir INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS ix_Files_path ON Files(path);
    CREATE INDEX IF NOT EXISTS ix_Files_is_dir ON Files(is_dir);
";

/// A row of the local `Files` table.
#[derive(Debug, Clone)]
pub struct LocalRecord {
    pub id: i64,
    pub path: String,
    pub ino: i64,
    pub crtime: Option<i64>,
    pub mtime: i64,
    pub is_dir: bool,
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<LocalRecord> {
    Ok(LocalRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        ino: row.get(2)?,
        crtime: row.get(3)?,
        mtime: row.get(4)?,
        is_dir: row.get::<_, i64>(5)? != 0,
    })
}

/// Opens (creating if absent) the local store's SQLite connection and
/// applies the configured journaling mode and schema.
pub fn open(db_path: &str, journal_mode: JournalMode) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", journal_mode.as_pragma_value())?;
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(conn)
}

pub fn create(
    conn: &Connection,
    path: &str,
    stat: &StatFingerprint,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO Files (path, ino, crtime, mtime, is_dir) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![path, stat.ino, stat.crtime, stat.mtime, stat.is_dir as i64],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_path(conn: &Connection, id: i64, path: &str) -> Result<()> {
    conn.execute("UPDATE Files SET path = ?1 WHERE id = ?2", params![path, id])?;
    Ok(())
}

pub fn update_stat_and_path(
    conn: &Connection,
    id: i64,
    stat: &StatFingerprint,
    path: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE Files SET ino = ?1, crtime = ?2, mtime = ?3, path = ?4 WHERE id = ?5",
        params![stat.ino, stat.crtime, stat.mtime, path, id],
    )?;
    Ok(())
}

pub fn update_stat(conn: &Connection, id: i64, stat: &StatFingerprint) -> Result<()> {
    conn.execute(
        "UPDATE Files SET ino = ?1, crtime = ?2, mtime = ?3 WHERE id = ?4",
        params![stat.ino, stat.crtime, stat.mtime, id],
    )?;
    Ok(())
}

/// Ensures a record exists for `(path, stat)`, matching by `ino`: updates
/// the existing row in place if found, otherwise inserts a fresh one. Used
/// to restore a directory's own row after `sync_dir` may have deleted it
/// (an identity mismatch on a directory's `mtime`, on platforms where
/// `mtime` doubles as the identity timestamp).
pub fn create_or_refresh(conn: &Connection, path: &str, stat: &StatFingerprint) -> Result<i64> {
    if let Some(record) = find_by_ino(conn, stat.ino)? {
        update_stat_and_path(conn, record.id, stat, path)?;
        Ok(record.id)
    } else {
        create(conn, path, stat)
    }
}

pub fn find_by_ino(conn: &Connection, ino: i64) -> Result<Option<LocalRecord>> {
    Ok(conn
        .query_row(
            "SELECT id, path, ino, crtime, mtime, is_dir FROM Files WHERE ino = ?1",
            params![ino],
            row_to_record,
        )
        .optional()?)
}

pub fn find_by_path(conn: &Connection, path: &str) -> Result<Option<LocalRecord>> {
    Ok(conn
        .query_row(
            "SELECT id, path, ino, crtime, mtime, is_dir FROM Files WHERE path = ?1",
            params![path],
            row_to_record,
        )
        .optional()?)
}

pub fn find_by_ino_and_path(conn: &Connection, ino: i64, path: &str) -> Result<Option<LocalRecord>> {
    Ok(conn
        .query_row(
            "SELECT id, path, ino, crtime, mtime, is_dir FROM Files WHERE ino = ?1 AND path = ?2",
            params![ino, path],
            row_to_record,
        )
        .optional()?)
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<LocalRecord>> {
    Ok(conn
        .query_row(
            "SELECT id, path, ino, crtime, mtime, is_dir FROM Files WHERE id = ?1",
            params![id],
            row_to_record,
        )
        .optional()?)
}

pub fn delete_by_id(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM Files WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn delete_by_path(conn: &Connection, path: &str) -> Result<()> {
    conn.execute("DELETE FROM Files WHERE path = ?1", params![path])?;
    Ok(())
}

/// Deletes every record whose path is a descendant of `prefix`.
pub fn delete_descendants(conn: &Connection, prefix: &str, sep: char) -> Result<()> {
    let glob = descendant_glob(prefix, sep);
    conn.execute("DELETE FROM Files WHERE path GLOB ?1", params![glob])?;
    Ok(())
}

/// Returns every record whose path is a descendant of `prefix`.
pub fn find_descendants(conn: &Connection, prefix: &str, sep: char) -> Result<Vec<LocalRecord>> {
    let glob = descendant_glob(prefix, sep);
    let mut stmt = conn.prepare(
        "SELECT id, path, ino, crtime, mtime, is_dir FROM Files WHERE path GLOB ?1",
    )?;
    let rows = stmt
        .query_map(params![glob], row_to_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Returns every directory record, for the `sync_all` sweep.
pub fn all_dirs(conn: &Connection) -> Result<Vec<LocalRecord>> {
    let mut stmt =
        conn.prepare("SELECT id, path, ino, crtime, mtime, is_dir FROM Files WHERE is_dir = 1")?;
    let rows = stmt
        .query_map([], row_to_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JournalMode;

    fn fingerprint(ino: i64, crtime: Option<i64>, mtime: i64, is_dir: bool) -> StatFingerprint {
        StatFingerprint { ino, crtime, mtime, is_dir, is_symlink: false }
    }

    #[test]
    fn create_and_find_round_trips() {
        let conn = open(":memory:", JournalMode::Memory).unwrap();
        let stat = fingerprint(1, Some(100), 200, false);
        let id = create(&conn, "/root/a", &stat).unwrap();

        let by_id = find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(by_id.path, "/root/a");
        let by_ino = find_by_ino(&conn, 1).unwrap().unwrap();
        assert_eq!(by_ino.id, id);
    }

    #[test]
    fn ino_uniqueness_enforced() {
        let conn = open(":memory:", JournalMode::Memory).unwrap();
        let stat = fingerprint(1, Some(100), 200, false);
        create(&conn, "/root/a", &stat).unwrap();
        let err = create(&conn, "/root/b", &stat);
        assert!(err.is_err());
    }

    #[test]
    fn path_need_not_be_unique() {
        let conn = open(":memory:", JournalMode::Memory).unwrap();
        create(&conn, "/root/a", &fingerprint(1, Some(100), 200, false)).unwrap();
        create(&conn, "/root/a", &fingerprint(2, Some(101), 201, false)).unwrap();
        assert!(find_by_ino(&conn, 1).unwrap().is_some());
        assert!(find_by_ino(&conn, 2).unwrap().is_some());
    }

    #[test]
    fn descendant_scan_matches_children_only() {
        let conn = open(":memory:", JournalMode::Memory).unwrap();
        create(&conn, "/root/dir", &fingerprint(1, Some(1), 1, true)).unwrap();
        create(&conn, "/root/dir/child", &fingerprint(2, Some(2), 2, false)).unwrap();
        create(&conn, "/root/dir2", &fingerprint(3, Some(3), 3, true)).unwrap();

        let found = find_descendants(&conn, "/root/dir", '/').unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "/root/dir/child");
    }
}
