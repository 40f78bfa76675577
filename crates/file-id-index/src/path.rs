//! Conversion between API paths (client-facing, relative, forward-slash)
//! and persistable paths (backend-facing, stored in the `Files` table).

use std::path::{Path, PathBuf};

use crate::error::{FileIdError, Result};

/// Normalizes paths for the local (stat-aware) backend: persistable paths
/// are absolute, case-normalized, lexically-normalized OS paths.
#[derive(Debug, Clone)]
pub struct LocalPathNormalizer {
    root_dir: PathBuf,
}

impl LocalPathNormalizer {
    pub fn new(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        if !root_dir.is_absolute() {
            return Err(FileIdError::PathInvalid(root_dir));
        }
        Ok(Self { root_dir })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Converts an API path (relative to `root_dir`, or already absolute)
    /// into a persistable, normalized absolute path.
    pub fn to_persisted(&self, api_path: impl AsRef<Path>) -> PathBuf {
        let api_path = api_path.as_ref();
        let joined = if api_path.is_absolute() {
            api_path.to_path_buf()
        } else {
            self.root_dir.join(api_path)
        };
        normalize_case(&lexically_normalize(&joined))
    }

    /// Converts a persisted absolute path back to an API path relative to
    /// `root_dir`. Fails with [`FileIdError::PathOutOfRoot`] if `path` does
    /// not denote a descendant of `root_dir`.
    pub fn from_persisted(&self, path: &Path) -> Result<String> {
        let relative = path.strip_prefix(&self.root_dir).map_err(|_| {
            FileIdError::PathOutOfRoot(path.to_string_lossy().into_owned())
        })?;
        Ok(to_forward_slash(relative))
    }
}

/// Lexically normalizes a path: resolves `.` and `..` components without
/// touching the filesystem (unlike `canonicalize`, which also requires the
/// path to exist and would resolve symlinks we want to handle ourselves).
fn lexically_normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(target_os = "windows")]
fn normalize_case(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().to_lowercase())
}

#[cfg(not(target_os = "windows"))]
fn normalize_case(path: &Path) -> PathBuf {
    path.to_path_buf()
}

fn to_forward_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalizes paths for the arbitrary (stat-free) backend: persistable
/// paths are forward-slash, rooted under `root_dir`, with no filesystem
/// assumptions.
#[derive(Debug, Clone)]
pub struct ArbitraryPathNormalizer {
    root_dir: String,
}

impl ArbitraryPathNormalizer {
    pub fn new(root_dir: impl Into<String>) -> Self {
        Self { root_dir: root_dir.into() }
    }

    pub fn root_dir(&self) -> &str {
        &self.root_dir
    }

    /// Collapses backslashes to forward slashes and roots the path under
    /// `root_dir` if it is not already rooted there.
    pub fn to_persisted(&self, api_path: &str) -> String {
        let collapsed = api_path
            .trim_matches('\\')
            .split('\\')
            .collect::<Vec<_>>()
            .join("/");

        if self.root_dir.is_empty() || collapsed.starts_with(&self.root_dir) {
            collapsed
        } else {
            format!("{}/{}", self.root_dir, collapsed)
        }
    }

    /// Strips `root_dir` from a persisted path, returning the remainder.
    pub fn from_persisted(&self, path: &str) -> Result<String> {
        if self.root_dir.is_empty() {
            return Ok(path.to_string());
        }
        path.strip_prefix(&self.root_dir)
            .map(|rest| rest.trim_start_matches('/').to_string())
            .ok_or_else(|| FileIdError::PathOutOfRoot(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_rejects_relative_root() {
        assert!(LocalPathNormalizer::new("relative/dir").is_err());
    }

    #[test]
    fn local_round_trips_relative_api_path() {
        let normalizer = LocalPathNormalizer::new("/root").unwrap();
        let persisted = normalizer.to_persisted("a/b");
        assert_eq!(persisted, PathBuf::from("/root/a/b"));
        assert_eq!(normalizer.from_persisted(&persisted).unwrap(), "a/b");
    }

    #[test]
    fn local_lexically_normalizes_dot_segments() {
        let normalizer = LocalPathNormalizer::new("/root").unwrap();
        let persisted = normalizer.to_persisted("a/../b/./c");
        assert_eq!(persisted, PathBuf::from("/root/b/c"));
    }

    #[test]
    fn local_out_of_root_fails() {
        let normalizer = LocalPathNormalizer::new("/root").unwrap();
        assert!(normalizer.from_persisted(Path::new("/elsewhere/a")).is_err());
    }

    #[test]
    fn arbitrary_collapses_backslashes() {
        let normalizer = ArbitraryPathNormalizer::new("");
        assert_eq!(normalizer.to_persisted("a\\b\\c"), "a/b/c");
    }

    #[test]
    fn arbitrary_roots_under_prefix() {
        let normalizer = ArbitraryPathNormalizer::new("s3://bucket");
        assert_eq!(normalizer.to_persisted("folder/child"), "s3://bucket/folder/child");

        let normalizer = ArbitraryPathNormalizer::new("s3://bucket/folder");
        assert_eq!(normalizer.to_persisted("child"), "s3://bucket/folder/child");
    }

    #[test]
    fn arbitrary_reverse_strips_root() {
        let normalizer = ArbitraryPathNormalizer::new("s3://bucket");
        assert_eq!(
            normalizer.from_persisted("s3://bucket/folder/child").unwrap(),
            "folder/child"
        );
        assert!(normalizer.from_persisted("other/child").is_err());
    }
}
