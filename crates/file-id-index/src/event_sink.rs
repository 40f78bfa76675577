//! Consumes contents-manager events and dispatches them to the active
//! index, per the schema `https://events.jupyter.org/jupyter_server/contents_service/v1`.

use serde::Deserialize;

use crate::error::Result;
use crate::index::FileIdIndex;

pub const SCHEMA_ID: &str = "https://events.jupyter.org/jupyter_server/contents_service/v1";

#[derive(Debug, Deserialize)]
pub struct ContentsEvent {
    pub action: String,
    pub path: String,
    #[serde(default)]
    pub source_path: Option<String>,
}

/// Routes one event to the index per the dispatch table in module docs on
/// [`FileIdIndex`]: `get` is always ignored, `save` is ignored on the
/// arbitrary backend, `rename`/`copy` require `source_path`.
pub fn dispatch(index: &FileIdIndex, event: &ContentsEvent) -> Result<()> {
    match event.action.as_str() {
        "get" => Ok(()),
        "save" => index.save(&event.path),
        "rename" => {
            if let Some(source_path) = &event.source_path {
                index.move_file(source_path, &event.path)?;
            }
            Ok(())
        }
        "copy" => {
            if let Some(source_path) = &event.source_path {
                index.copy(source_path, &event.path)?;
            }
            Ok(())
        }
        "delete" => index.delete(&event.path),
        _ => {
            tracing::debug!(action = %event.action, "ignoring unrecognized contents event action");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    #[test]
    fn rename_event_moves_the_record() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("old")).unwrap();
        let config = Config::local(dir.path().to_str().unwrap(), ":memory:").unwrap();
        let index = FileIdIndex::open(config).unwrap();
        let id = index.index("old").unwrap().unwrap();

        std::fs::rename(dir.path().join("old"), dir.path().join("new")).unwrap();
        dispatch(
            &index,
            &ContentsEvent {
                action: "rename".to_string(),
                path: "new".to_string(),
                source_path: Some("old".to_string()),
            },
        )
        .unwrap();

        assert_eq!(index.get_path(&id).unwrap(), Some("new".to_string()));
    }

    #[test]
    fn delete_event_clears_the_record() {
        let config = Config::arbitrary("", ":memory:").unwrap();
        let index = FileIdIndex::open(config).unwrap();
        index.index("a").unwrap();

        dispatch(
            &index,
            &ContentsEvent {
                action: "delete".to_string(),
                path: "a".to_string(),
                source_path: None,
            },
        )
        .unwrap();

        assert_eq!(index.get_id("a").unwrap(), None);
    }

    #[test]
    fn get_event_is_ignored() {
        let config = Config::arbitrary("", ":memory:").unwrap();
        let index = FileIdIndex::open(config).unwrap();
        dispatch(
            &index,
            &ContentsEvent {
                action: "get".to_string(),
                path: "a".to_string(),
                source_path: None,
            },
        )
        .unwrap();
        assert_eq!(index.get_id("a").unwrap(), None);
    }
}
