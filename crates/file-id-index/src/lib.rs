//! Persistent file-identity index.
//!
//! Maintains a stable, opaque id for every file and directory under a root,
//! surviving renames and moves whether performed through this crate's API
//! or out-of-band on the underlying filesystem. Two backends are provided:
//! [`LocalIndex`], which reconciles against filesystem stat, and
//! [`ArbitraryIndex`], which trusts only its own records (for filesystems
//! where stat is unavailable or meaningless, e.g. object storage).

pub mod arbitrary_index;
pub mod config;
pub mod error;
pub mod event_sink;
pub mod index;
pub mod local_index;
pub mod path;
pub mod stat;
pub mod store;

pub use arbitrary_index::ArbitraryIndex;
pub use config::{Backend, Config};
pub use error::{FileIdError, Result};
pub use event_sink::{dispatch as dispatch_event, ContentsEvent, SCHEMA_ID};
pub use index::FileIdIndex;
pub use local_index::LocalIndex;
pub use path::{ArbitraryPathNormalizer, LocalPathNormalizer};
pub use stat::StatFingerprint;
