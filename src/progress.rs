//! Progress-callback trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through the document.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a log, or a terminal progress bar without the
//! library knowing how the host application communicates. The trait is
//! `Send + Sync` because pages may be processed by concurrent workers.
//!
//! # Example
//!
//! ```rust
//! use pdf2md_hybrid::{ConversionProgressCallback, ConversionConfig, ExtractionMethod};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     chars: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(
//!         &self,
//!         page_num: usize,
//!         total_pages: usize,
//!         method: ExtractionMethod,
//!         text_chars: usize,
//!         _images: usize,
//!     ) {
//!         self.chars.fetch_add(text_chars, Ordering::SeqCst);
//!         eprintln!("Page {}/{} via {}", page_num, total_pages, method);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     chars: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::config::ConversionMode;
use crate::output::{ConversionReport, ExtractionMethod, PageStatus};
use std::sync::Arc;

/// Called by the orchestrator as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. With `concurrency > 1` the per-page methods may be
/// called concurrently from different threads.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after the mode is resolved and before any page work.
    fn on_conversion_start(&self, total_pages: usize, mode: ConversionMode) {
        let _ = (total_pages, mode);
    }

    /// Called just before a page enters the extraction chain.
    ///
    /// # Arguments
    /// * `page_num`   : 1-indexed page number
    /// * `total_pages`: total pages in the document
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page produced content.
    ///
    /// # Arguments
    /// * `method`    : the strategy that produced it
    /// * `text_chars`: characters of cleaned text
    /// * `images`    : image references saved for the page
    fn on_page_complete(
        &self,
        page_num: usize,
        total_pages: usize,
        method: ExtractionMethod,
        text_chars: usize,
        images: usize,
    ) {
        let _ = (page_num, total_pages, method, text_chars, images);
    }

    /// Called when a page got a placeholder because of sampling or the budget.
    fn on_page_skipped(&self, page_num: usize, total_pages: usize, reason: PageStatus) {
        let _ = (page_num, total_pages, reason);
    }

    /// Called when no strategy produced content and one of them failed.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has a result.
    fn on_conversion_complete(&self, report: &ConversionReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        skips: AtomicUsize,
        errors: AtomicUsize,
        chars: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(
            &self,
            _page_num: usize,
            _total_pages: usize,
            _method: ExtractionMethod,
            text_chars: usize,
            _images: usize,
        ) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.chars.fetch_add(text_chars, Ordering::SeqCst);
        }

        fn on_page_skipped(&self, _page_num: usize, _total_pages: usize, _reason: PageStatus) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(5, ConversionMode::Hybrid);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, ExtractionMethod::NativeText, 42, 0);
        cb.on_page_skipped(2, 5, PageStatus::SkippedByBudget);
        cb.on_page_error(3, 5, "some error");
        cb.on_conversion_complete(&ConversionReport::new(
            "a.pdf",
            Mode::Auto,
            ConversionMode::Hybrid,
            "fast",
            5,
        ));
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_page_start(1, 3);
        tracker.on_page_complete(1, 3, ExtractionMethod::NativeText, 100, 0);
        tracker.on_page_start(2, 3);
        tracker.on_page_complete(2, 3, ExtractionMethod::Ocr, 200, 0);
        tracker.on_page_skipped(3, 3, PageStatus::SkippedBySampling);
        tracker.on_page_error(3, 3, "tesseract crashed");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.skips.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.chars.load(Ordering::SeqCst), 300);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn ConversionProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_conversion_start(10, ConversionMode::Ocr);
        cb.on_page_start(1, 10);
    }
}
