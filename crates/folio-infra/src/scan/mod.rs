//! Content scanning - choosing a display image from post markup.

use folio_core::ports::ContentScanner;
use scraper::{Html, Selector};

/// Uses the `src` of the first `<img>` tag in the content.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstImageScanner;

impl ContentScanner for FirstImageScanner {
    fn display_image_for(&self, content: &str) -> Option<String> {
        let selector = Selector::parse("img[src]").ok()?;
        let fragment = Html::parse_fragment(content);

        fragment
            .select(&selector)
            .filter_map(|img| img.value().attr("src"))
            .map(str::trim)
            .find(|src| !src.is_empty())
            .map(String::from)
    }
}
