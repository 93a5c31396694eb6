//! Document-level profiling and mode recommendation.

use super::budget::TimeBudget;
use super::classify::{classify_page, PageCategory, PageClassification};
use super::document::Document;
use crate::capability::CapabilitySet;
use crate::config::{ConversionMode, PerformanceProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Without any classified page, documents above this many pages are assumed
/// to be scans.
const PROBE_OCR_PAGES: usize = 100;
/// Without any classified page, files above this size are assumed to be scans.
const PROBE_OCR_BYTES: u64 = 50 * 1024 * 1024;

/// Aggregate view of a document, computed once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentProfile {
    pub total_pages: usize,
    pub file_size: u64,
    pub text_pages: usize,
    pub image_pages: usize,
    pub mixed_pages: usize,
    pub empty_pages: usize,
    /// Pages no collaborator could open (counted as image pages too).
    pub unreadable_pages: usize,
    /// Pages classified before the budget ran out.
    pub classified_pages: usize,
    /// `(text_pages + mixed_pages) / classified_pages`, 0 when nothing was classified.
    pub text_ratio: f64,
    pub recommended_mode: ConversionMode,
    /// One entry per classified page, ascending.
    pub classifications: Vec<PageClassification>,
}

impl DocumentProfile {
    /// Aggregate classifications into a profile.
    pub fn from_classifications(
        total_pages: usize,
        file_size: u64,
        mut classifications: Vec<PageClassification>,
        profile: &PerformanceProfile,
    ) -> Self {
        classifications.sort_by_key(|c| c.page_index);
        let count = |cat: PageCategory| {
            classifications
                .iter()
                .filter(|c| c.category == cat)
                .count()
        };
        let text_pages = count(PageCategory::Text);
        let image_pages = count(PageCategory::Image);
        let mixed_pages = count(PageCategory::Mixed);
        let empty_pages = count(PageCategory::Empty);
        let unreadable_pages = classifications.iter().filter(|c| !c.readable).count();
        let classified_pages = classifications.len();

        let text_ratio = if classified_pages == 0 {
            0.0
        } else {
            (text_pages + mixed_pages) as f64 / classified_pages as f64
        };

        let recommended_mode = if total_pages == 0 {
            ConversionMode::Hybrid
        } else if classified_pages == 0 {
            probe_recommendation(total_pages, file_size)
        } else {
            recommend(text_ratio, profile)
        };

        Self {
            total_pages,
            file_size,
            text_pages,
            image_pages,
            mixed_pages,
            empty_pages,
            unreadable_pages,
            classified_pages,
            text_ratio,
            recommended_mode,
            classifications,
        }
    }

    /// 0-based pages without a usable text layer.
    ///
    /// Pages the analysis never reached are included: nothing is known about
    /// them, so they stay candidates for visual work.
    pub fn needs_visual(&self) -> BTreeSet<usize> {
        let mut known = vec![None; self.total_pages];
        for c in &self.classifications {
            if let Some(slot) = known.get_mut(c.page_index) {
                *slot = Some(c.category.needs_visual());
            }
        }
        known
            .into_iter()
            .enumerate()
            .filter(|(_, needs)| needs.unwrap_or(true))
            .map(|(page, _)| page)
            .collect()
    }

    pub fn classification(&self, page_index: usize) -> Option<&PageClassification> {
        self.classifications
            .binary_search_by_key(&page_index, |c| c.page_index)
            .ok()
            .map(|i| &self.classifications[i])
    }
}

/// Mode recommendation from the text ratio.
///
/// Above `hybrid_ratio_threshold` is Hybrid, below `ocr_ratio_threshold` is
/// Ocr, and the band in between stays Hybrid: a partial text layer is still
/// worth keeping.
pub fn recommend(text_ratio: f64, profile: &PerformanceProfile) -> ConversionMode {
    if text_ratio > profile.hybrid_ratio_threshold {
        ConversionMode::Hybrid
    } else if text_ratio < profile.ocr_ratio_threshold {
        ConversionMode::Ocr
    } else {
        ConversionMode::Hybrid
    }
}

fn probe_recommendation(total_pages: usize, file_size: u64) -> ConversionMode {
    if total_pages > PROBE_OCR_PAGES || file_size > PROBE_OCR_BYTES {
        ConversionMode::Ocr
    } else {
        ConversionMode::Hybrid
    }
}

/// Classify every page and aggregate. Never fails.
///
/// The budget is checked before each page; once it runs out the remaining
/// pages are left unclassified and the profile is computed from the rest.
pub fn analyze(
    caps: &CapabilitySet,
    document: &Document,
    profile: &PerformanceProfile,
    budget: &TimeBudget,
) -> DocumentProfile {
    let mut classifications = Vec::with_capacity(document.total_pages);
    for page_index in 0..document.total_pages {
        if budget.is_exhausted() {
            warn!(
                "Time budget exhausted during analysis after {}/{} pages",
                page_index, document.total_pages
            );
            break;
        }
        let c = classify_page(
            caps,
            &document.path,
            page_index,
            profile.classifier_text_threshold,
        );
        debug!(
            "Page {}: {:?} ({} chars, {} images)",
            page_index + 1,
            c.category,
            c.text_length,
            c.embedded_image_count
        );
        classifications.push(c);
    }

    let result = DocumentProfile::from_classifications(
        document.total_pages,
        document.file_size,
        classifications,
        profile,
    );
    info!(
        "Analysis: {} pages (text {}, mixed {}, image {}, empty {}), text ratio {:.2} → {}",
        result.total_pages,
        result.text_pages,
        result.mixed_pages,
        result.image_pages,
        result.empty_pages,
        result.text_ratio,
        result.recommended_mode
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_page(i: usize) -> PageClassification {
        PageClassification::from_measurements(i, 500, 0, 100)
    }

    fn blank_page(i: usize) -> PageClassification {
        PageClassification::from_measurements(i, 0, 0, 100)
    }

    #[test]
    fn ratio_boundaries() {
        let p = PerformanceProfile::fast();
        assert_eq!(recommend(0.8, &p), ConversionMode::Hybrid);
        assert_eq!(recommend(0.5, &p), ConversionMode::Hybrid);
        assert_eq!(recommend(0.1, &p), ConversionMode::Ocr);
    }

    #[test]
    fn counts_and_ratio() {
        let pages = vec![
            text_page(0),
            PageClassification::from_measurements(1, 200, 1, 100),
            blank_page(2),
            PageClassification::unreadable(3),
        ];
        let profile =
            DocumentProfile::from_classifications(4, 1024, pages, &PerformanceProfile::fast());
        assert_eq!(profile.text_pages, 1);
        assert_eq!(profile.mixed_pages, 1);
        assert_eq!(profile.empty_pages, 1);
        assert_eq!(profile.image_pages, 1);
        assert_eq!(profile.unreadable_pages, 1);
        assert!((profile.text_ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(profile.recommended_mode, ConversionMode::Hybrid);
        assert_eq!(profile.needs_visual(), [2, 3].into_iter().collect());
    }

    #[test]
    fn scanned_document_recommends_ocr() {
        let pages = (0..10).map(blank_page).collect();
        let profile =
            DocumentProfile::from_classifications(10, 1024, pages, &PerformanceProfile::fast());
        assert_eq!(profile.text_ratio, 0.0);
        assert_eq!(profile.recommended_mode, ConversionMode::Ocr);
    }

    #[test]
    fn classification_lookup_by_page_index() {
        // Out of order on purpose; page 2 was never reached.
        let pages = vec![text_page(3), blank_page(0), text_page(1)];
        let profile =
            DocumentProfile::from_classifications(5, 1024, pages, &PerformanceProfile::fast());
        let indices: Vec<usize> = profile.classifications.iter().map(|c| c.page_index).collect();
        assert_eq!(indices, vec![0, 1, 3]);

        assert_eq!(profile.classification(0).map(|c| c.category), Some(PageCategory::Empty));
        assert_eq!(profile.classification(3).map(|c| c.page_index), Some(3));
        assert!(profile.classification(2).is_none());
        assert!(profile.classification(4).is_none());
    }

    #[test]
    fn zero_pages_recommends_hybrid() {
        let profile =
            DocumentProfile::from_classifications(0, 0, Vec::new(), &PerformanceProfile::fast());
        assert_eq!(profile.recommended_mode, ConversionMode::Hybrid);
        assert!(profile.needs_visual().is_empty());
    }

    #[test]
    fn unclassified_document_uses_size_probe() {
        let p = PerformanceProfile::fast();
        let small = DocumentProfile::from_classifications(12, 1024, Vec::new(), &p);
        assert_eq!(small.recommended_mode, ConversionMode::Hybrid);
        let long = DocumentProfile::from_classifications(300, 1024, Vec::new(), &p);
        assert_eq!(long.recommended_mode, ConversionMode::Ocr);
        // Unreached pages remain visual candidates.
        assert_eq!(small.needs_visual().len(), 12);
    }

    #[test]
    fn partial_analysis_keeps_unreached_pages_visual() {
        let profile = DocumentProfile::from_classifications(
            3,
            1024,
            vec![text_page(0)],
            &PerformanceProfile::fast(),
        );
        assert_eq!(profile.needs_visual(), [1, 2].into_iter().collect());
    }
}
