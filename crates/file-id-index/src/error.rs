use std::path::PathBuf;

/// Unified error type for the file identity index.
#[derive(Debug, thiserror::Error)]
pub enum FileIdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path must be absolute: {0}")]
    PathInvalid(PathBuf),

    #[error("path is not a descendant of root_dir: {0}")]
    PathOutOfRoot(String),

    #[error("db_path must be absolute or \":memory:\": {0}")]
    DbPathInvalid(String),

    #[error("unrecognized journal mode: {0}")]
    InvalidJournalMode(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, FileIdError>;
