/// Picks the image that represents a post in lists.
///
/// Called after every content mutation; `None` clears the display image.
pub trait ContentScanner: Send + Sync {
    fn display_image_for(&self, content: &str) -> Option<String>;
}
