//! In-memory media catalog.

use std::collections::HashMap;
use std::sync::RwLock;

use folio_core::domain::{MediaId, MediaInfo, MediaUploadState};
use folio_core::ports::MediaCatalog;

/// Media catalog backed by a HashMap.
///
/// The catalog is read from synchronous domain predicates, so it uses a
/// blocking lock that is never held across an await.
#[derive(Default)]
pub struct InMemoryMediaCatalog {
    items: RwLock<HashMap<MediaId, MediaInfo>>,
}

impl InMemoryMediaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, info: MediaInfo) {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.insert(info.id, info);
    }

    /// Record a new upload state. Returns false for unknown media.
    pub fn set_upload_state(&self, id: MediaId, state: MediaUploadState) -> bool {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        match items.get_mut(&id) {
            Some(info) => {
                tracing::debug!(media_id = %id.0, ?state, "Media upload state changed");
                info.upload_state = state;
                true
            }
            None => false,
        }
    }
}

impl MediaCatalog for InMemoryMediaCatalog {
    fn get(&self, id: MediaId) -> Option<MediaInfo> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        items.get(&id).cloned()
    }
}
