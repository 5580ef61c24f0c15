use crate::domain::{MediaId, MediaInfo};

/// Read access to the media library. The core never owns media state.
pub trait MediaCatalog: Send + Sync {
    fn get(&self, id: MediaId) -> Option<MediaInfo>;
}
