use std::sync::Arc;

use file_id_index::FileIdIndex;

/// Shared application state. Index operations are synchronous (the core has
/// no internal suspension points), so handlers dispatch them onto the
/// blocking pool rather than holding them on the async executor.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<FileIdIndex>,
}
