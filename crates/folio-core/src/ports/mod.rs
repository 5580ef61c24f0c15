//! Ports - trait definitions for external collaborators.
//! These are the "interfaces" that infrastructure must implement.

mod clock;
mod content_scan;
mod media;
mod repository;

pub use clock::{Clock, FixedClock, SystemClock};
pub use content_scan::ContentScanner;
pub use media::MediaCatalog;
pub use repository::{BaseRepository, PostRepository};
