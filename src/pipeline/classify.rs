//! Per-page content classification.
//!
//! A classification is a hint for the analyzer and the sampler, never a gate
//! for extraction: the chain still tries every strategy on every page.

use crate::capability::CapabilitySet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// What a page mostly carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageCategory {
    /// Meaningful text, no embedded images.
    Text,
    /// Embedded images and little text, or an unreadable page.
    Image,
    /// Meaningful text and at least one embedded image.
    Mixed,
    /// Neither meaningful text nor images: blank or scanned.
    Empty,
}

impl PageCategory {
    /// `Image` and `Empty` pages have no usable text layer and are the
    /// candidates for rasterisation or OCR.
    pub fn needs_visual(&self) -> bool {
        matches!(self, PageCategory::Image | PageCategory::Empty)
    }

    pub fn has_meaningful_text(&self) -> bool {
        matches!(self, PageCategory::Text | PageCategory::Mixed)
    }
}

/// Immutable result of classifying one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageClassification {
    /// 0-based page index.
    pub page_index: usize,
    pub has_text: bool,
    /// Characters of trimmed text-layer output.
    pub text_length: usize,
    pub embedded_image_count: usize,
    pub category: PageCategory,
    /// `false` when no collaborator could open the page.
    pub readable: bool,
}

impl PageClassification {
    /// Apply the decision rule to measured values.
    ///
    /// More than `text_threshold` chars with images is `Mixed`, without is
    /// `Text`. Otherwise pages with images are `Image` and pages with none
    /// are `Empty`.
    pub fn from_measurements(
        page_index: usize,
        text_length: usize,
        embedded_image_count: usize,
        text_threshold: usize,
    ) -> Self {
        let category = match (text_length > text_threshold, embedded_image_count > 0) {
            (true, true) => PageCategory::Mixed,
            (true, false) => PageCategory::Text,
            (false, true) => PageCategory::Image,
            (false, false) => PageCategory::Empty,
        };
        Self {
            page_index,
            has_text: text_length > 0,
            text_length,
            embedded_image_count,
            category,
            readable: true,
        }
    }

    /// The degraded classification for a page nothing could open.
    pub fn unreadable(page_index: usize) -> Self {
        Self {
            page_index,
            has_text: false,
            text_length: 0,
            embedded_image_count: 0,
            category: PageCategory::Image,
            readable: false,
        }
    }
}

/// Classify one page with whatever readers `caps` carries.
///
/// Text comes from the first text reader that succeeds; images from the asset
/// extractor. Never fails: a page no collaborator could open degrades to
/// [`PageClassification::unreadable`].
pub fn classify_page(
    caps: &CapabilitySet,
    path: &Path,
    page_index: usize,
    text_threshold: usize,
) -> PageClassification {
    let mut any_success = false;

    let mut text_length = 0;
    for reader in caps.text_readers() {
        match reader.read_page_text(path, page_index) {
            Ok(text) => {
                text_length = text.trim().chars().count();
                any_success = true;
                break;
            }
            Err(e) => debug!(
                "Page {}: {} could not read text: {}",
                page_index + 1,
                reader.name(),
                e
            ),
        }
    }

    let mut image_count = 0;
    if let Some(assets) = &caps.assets {
        match assets.count_images(path, page_index) {
            Ok(n) => {
                image_count = n;
                any_success = true;
            }
            Err(e) => debug!("Page {}: image count failed: {}", page_index + 1, e),
        }
    }

    if !any_success {
        warn!("Page {}: unreadable, classified as image", page_index + 1);
        return PageClassification::unreadable(page_index);
    }

    PageClassification::from_measurements(page_index, text_length, image_count, text_threshold)
}
