use regex::{Captures, Regex};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::media::{LocalMedia, MediaFetcher};

/// Marker form `[CQ:image,url=<locator>]`, or a bare http(s) URL ending in an
/// image extension with an optional query string. Local markers use
/// `file=` and a `file://` URI, so neither branch matches them.
const IMAGE_REFERENCE: &str = concat!(
    r"\[CQ:image,url=(?P<marked>[^\]]+)\]",
    "|",
    r"(?P<bare>https?://[^\s\[\]]+\.(?i:jpg|jpeg|png|gif|bmp|webp)(?:\?[^\s\[\]]*)?)",
);

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Localized {
    pub(crate) text: String,
    /// Distinct locators now served from local storage.
    pub(crate) fetched: usize,
    /// Distinct locators left untouched because the fetch failed.
    pub(crate) failed: usize,
}

pub(crate) struct ContentLocalizer {
    pattern: Regex,
}

impl ContentLocalizer {
    pub(crate) fn new() -> Result<Self, AppError> {
        let pattern = Regex::new(IMAGE_REFERENCE)
            .map_err(|e| AppError::Config(format!("invalid image pattern: {e}")))?;
        Ok(Self { pattern })
    }

    fn locator<'t>(caps: &Captures<'t>) -> Option<&'t str> {
        caps.name("marked")
            .or_else(|| caps.name("bare"))
            .map(|m| m.as_str())
    }

    /// Distinct remote locators in order of first appearance.
    pub(crate) fn locators<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut seen = Vec::new();
        for caps in self.pattern.captures_iter(text) {
            if let Some(loc) = Self::locator(&caps) {
                if !seen.contains(&loc) {
                    seen.push(loc);
                }
            }
        }
        seen
    }

    /// Fetch every distinct locator once and replace each of its occurrences
    /// with the local marker. Locators whose fetch fails keep their original
    /// bytes; text outside references is copied unchanged.
    pub(crate) async fn localize(&self, media: &MediaFetcher, text: &str) -> Localized {
        let mut stored: HashMap<&str, LocalMedia> = HashMap::new();
        let mut failed = 0;
        for loc in self.locators(text) {
            match media.fetch(loc).await {
                Ok(local) => {
                    debug!(locator = %loc, fingerprint = %local.fingerprint, "Localized image");
                    stored.insert(loc, local);
                }
                Err(e) => {
                    warn!(locator = %loc, "Image fetch failed, keeping remote reference: {e}");
                    failed += 1;
                }
            }
        }

        if stored.is_empty() {
            return Localized {
                text: text.to_string(),
                fetched: 0,
                failed,
            };
        }

        let rewritten = self.pattern.replace_all(text, |caps: &Captures| {
            match Self::locator(caps).and_then(|loc| stored.get(loc)) {
                Some(local) => local.marker(),
                None => caps[0].to_string(),
            }
        });
        Localized {
            text: rewritten.into_owned(),
            fetched: stored.len(),
            failed,
        }
    }
}
