//! SQLite-backed store for the arbitrary (stat-free) file identity backend.
//!
//! Schema: a single `Files` table keyed by a UUID string `id`, with a unique
//! `path`. Unlike the local backend there is no stat fingerprint to
//! reconcile against, so uniqueness on `path` is safe to enforce.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::store::{descendant_glob, JournalMode};

const CREATE_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS Files(
        id   TEXT PRIMARY KEY,
        path TEXT NOT NULL UNIQUE
    );
    CREATE INDEX IF NOT EXISTS ix_Files_path ON Files(path);
";

pub fn open(db_path: &str, journal_mode: JournalMode) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", journal_mode.as_pragma_value())?;
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(conn)
}

pub fn create(conn: &Connection, id: &str, path: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO Files (id, path) VALUES (?1, ?2)",
        params![id, path],
    )?;
    Ok(())
}

pub fn find_id_by_path(conn: &Connection, path: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT id FROM Files WHERE path = ?1", params![path], |r| {
            r.get(0)
        })
        .optional()?)
}

pub fn find_path_by_id(conn: &Connection, id: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT path FROM Files WHERE id = ?1", params![id], |r| {
            r.get(0)
        })
        .optional()?)
}

pub fn update_path(conn: &Connection, old_path: &str, new_path: &str) -> Result<()> {
    conn.execute(
        "UPDATE Files SET path = ?1 WHERE path = ?2",
        params![new_path, old_path],
    )?;
    Ok(())
}

pub fn update_path_by_id(conn: &Connection, id: &str, new_path: &str) -> Result<()> {
    conn.execute("UPDATE Files SET path = ?1 WHERE id = ?2", params![new_path, id])?;
    Ok(())
}

pub fn delete_by_path(conn: &Connection, path: &str) -> Result<()> {
    conn.execute("DELETE FROM Files WHERE path = ?1", params![path])?;
    Ok(())
}

pub fn delete_descendants(conn: &Connection, prefix: &str, sep: char) -> Result<()> {
    let glob = descendant_glob(prefix, sep);
    conn.execute("DELETE FROM Files WHERE path GLOB ?1", params![glob])?;
    Ok(())
}

/// Returns `(id, path)` for every descendant of `prefix`.
pub fn find_descendants(conn: &Connection, prefix: &str, sep: char) -> Result<Vec<(String, String)>> {
    let glob = descendant_glob(prefix, sep);
    let mut stmt = conn.prepare("SELECT id, path FROM Files WHERE path GLOB ?1")?;
    let rows = stmt
        .query_map(params![glob], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_lookup_round_trips() {
        let conn = open(":memory:", JournalMode::Memory).unwrap();
        create(&conn, "id-1", "/root/a").unwrap();
        assert_eq!(find_id_by_path(&conn, "/root/a").unwrap().as_deref(), Some("id-1"));
        assert_eq!(find_path_by_id(&conn, "id-1").unwrap().as_deref(), Some("/root/a"));
    }

    #[test]
    fn path_is_unique() {
        let conn = open(":memory:", JournalMode::Memory).unwrap();
        create(&conn, "id-1", "/root/a").unwrap();
        assert!(create(&conn, "id-2", "/root/a").is_err());
    }

    #[test]
    fn descendants_found_by_prefix() {
        let conn = open(":memory:", JournalMode::Memory).unwrap();
        create(&conn, "id-1", "/root/dir").unwrap();
        create(&conn, "id-2", "/root/dir/child").unwrap();
        create(&conn, "id-3", "/root/other").unwrap();

        let found = find_descendants(&conn, "/root/dir", '/').unwrap();
        assert_eq!(found, vec![("id-2".to_string(), "/root/dir/child".to_string())]);
    }
}
