//! Filesystem stat probing for the local backend.
//!
//! Projects a platform `stat`/`lstat` result into a fixed fingerprint used
//! to recognize "the same file" across out-of-band moves: inode number plus
//! creation time (or modification time, on platforms without birthtime).

use std::fs;
use std::path::Path;

/// A stable fingerprint of a file's filesystem identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFingerprint {
    pub ino: i64,
    pub crtime: Option<i64>,
    pub mtime: i64,
    pub is_dir: bool,
    pub is_symlink: bool,
}

impl StatFingerprint {
    /// Returns the timestamp used for identity comparison: `crtime` when
    /// both sides have it, else `mtime`.
    pub fn identity_timestamp(&self) -> i64 {
        self.crtime.unwrap_or(self.mtime)
    }
}

/// Probes `path` (not following the final symlink) and returns its
/// fingerprint, or `None` if nothing exists at `path`.
pub fn lstat(path: &Path) -> Option<StatFingerprint> {
    let metadata = fs::symlink_metadata(path).ok()?;
    Some(fingerprint_from_metadata(&metadata))
}

#[cfg(unix)]
fn fingerprint_from_metadata(metadata: &fs::Metadata) -> StatFingerprint {
    use std::os::unix::fs::MetadataExt;

    let crtime = metadata
        .created()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64);
    StatFingerprint {
        ino: metadata.ino() as i64,
        crtime,
        mtime: metadata.mtime() * 1_000_000_000 + metadata.mtime_nsec(),
        is_dir: metadata.file_type().is_dir(),
        is_symlink: metadata.file_type().is_symlink(),
    }
}

#[cfg(windows)]
fn fingerprint_from_metadata(metadata: &fs::Metadata) -> StatFingerprint {
    use std::os::windows::fs::MetadataExt;

    StatFingerprint {
        ino: metadata.file_index().unwrap_or(0) as i64,
        crtime: Some(metadata.creation_time() as i64 * 100),
        mtime: metadata.last_write_time() as i64 * 100,
        is_dir: metadata.file_type().is_dir(),
        is_symlink: metadata.file_type().is_symlink(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn missing_path_returns_none() {
        let dir = tempdir().unwrap();
        assert!(lstat(&dir.path().join("nope")).is_none());
    }

    #[test]
    fn existing_file_reports_fingerprint() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("a");
        File::create(&file_path).unwrap();

        let fp = lstat(&file_path).unwrap();
        assert!(!fp.is_dir);
        assert!(!fp.is_symlink);
    }

    #[test]
    fn directory_is_flagged() {
        let dir = tempdir().unwrap();
        let fp = lstat(dir.path()).unwrap();
        assert!(fp.is_dir);
    }
}
