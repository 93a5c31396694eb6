//! Result types: per-page extraction results, the run report and the full
//! conversion output.
//!
//! Everything here is `Serialize` so the CLI can emit `--json` and library
//! callers can persist a run for later comparison.

use crate::config::{ConversionMode, Mode};
use crate::error::{ErrorKind, PageError};
use crate::pipeline::analyze::DocumentProfile;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// How a page's content was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    NativeText,
    AlternateText,
    Rasterize,
    Ocr,
    /// No strategy produced content.
    None,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::NativeText => "native text",
            ExtractionMethod::AlternateText => "alternate text",
            ExtractionMethod::Rasterize => "rasterize",
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::None => "none",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a page received work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    #[default]
    Processed,
    /// Left out of the sample on a large document; no cheap method found text.
    SkippedBySampling,
    /// The time budget ran out before the page was reached.
    SkippedByBudget,
}

/// Outcome for one page. Exactly one per page per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// 0-based page index.
    pub page_index: usize,
    /// Cleaned text, `None` when no strategy produced any.
    pub text: Option<String>,
    /// Image references relative to the Markdown file, in extraction order:
    /// embedded assets first, then a full-page raster.
    pub image_paths: Vec<String>,
    pub method_used: ExtractionMethod,
    /// Set only when nothing was produced and the last attempted step failed.
    pub error: Option<PageError>,
    pub status: PageStatus,
    /// Non-fatal problems, e.g. an image that could not be written.
    pub warnings: Vec<PageError>,
    pub duration_ms: u64,
}

impl ExtractionResult {
    /// An untouched result for `page_index`.
    pub fn new(page_index: usize) -> Self {
        Self {
            page_index,
            text: None,
            image_paths: Vec::new(),
            method_used: ExtractionMethod::None,
            error: None,
            status: PageStatus::Processed,
            warnings: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn skipped(page_index: usize, status: PageStatus) -> Self {
        Self {
            status,
            ..Self::new(page_index)
        }
    }

    /// 1-indexed page number.
    pub fn page_num(&self) -> usize {
        self.page_index + 1
    }

    pub fn text_chars(&self) -> usize {
        self.text.as_deref().map_or(0, |t| t.chars().count())
    }

    pub fn has_content(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty()) || !self.image_paths.is_empty()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(PageError::kind)
    }
}

/// Machine-readable summary of one run.
///
/// Built incrementally by the orchestrator through [`ConversionReport::record`];
/// read-only once the run ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub source: String,
    pub requested_mode: Mode,
    pub mode_used: ConversionMode,
    pub profile_name: String,
    pub total_pages: usize,
    pub total_text_chars: usize,
    pub total_images: usize,
    pub pages_processed: usize,
    pub pages_failed: usize,
    pub pages_skipped_due_to_budget: usize,
    pub pages_skipped_due_to_sampling: usize,
    /// 1-based pages eligible for expensive work, when sampling applied.
    pub sampled_pages: Option<Vec<usize>>,
    pub elapsed_ms: u64,
    pub warnings: Vec<String>,
}

impl ConversionReport {
    pub fn new(
        source: impl Into<String>,
        requested_mode: Mode,
        mode_used: ConversionMode,
        profile_name: impl Into<String>,
        total_pages: usize,
    ) -> Self {
        Self {
            source: source.into(),
            requested_mode,
            mode_used,
            profile_name: profile_name.into(),
            total_pages,
            total_text_chars: 0,
            total_images: 0,
            pages_processed: 0,
            pages_failed: 0,
            pages_skipped_due_to_budget: 0,
            pages_skipped_due_to_sampling: 0,
            sampled_pages: None,
            elapsed_ms: 0,
            warnings: Vec::new(),
        }
    }

    /// Fold one page's outcome into the counters.
    pub fn record(&mut self, result: &ExtractionResult) {
        match result.status {
            PageStatus::SkippedByBudget => self.pages_skipped_due_to_budget += 1,
            PageStatus::SkippedBySampling => self.pages_skipped_due_to_sampling += 1,
            PageStatus::Processed => {
                self.pages_processed += 1;
                if result.error.is_some() {
                    self.pages_failed += 1;
                }
            }
        }
        self.total_text_chars += result.text_chars();
        self.total_images += result.image_paths.len();
        self.warnings
            .extend(result.warnings.iter().map(ToString::to_string));
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// `false` only when pages were processed and every one of them failed.
    /// Skipped pages are a documented trade-off, not a failure.
    pub fn success(&self) -> bool {
        self.pages_processed == 0 || self.pages_failed < self.pages_processed
    }

    /// One-line human-readable outcome.
    pub fn message(&self) -> String {
        let mut msg = format!(
            "{} mode: {} characters, {} images from {}/{} pages in {:.1}s",
            self.mode_used,
            format_thousands(self.total_text_chars),
            self.total_images,
            self.pages_processed,
            self.total_pages,
            self.elapsed_ms as f64 / 1000.0
        );
        let mut notes = Vec::new();
        if self.pages_failed > 0 {
            notes.push(format!("{} failed", self.pages_failed));
        }
        if self.pages_skipped_due_to_budget > 0 {
            notes.push(format!(
                "{} skipped: time budget",
                self.pages_skipped_due_to_budget
            ));
        }
        if self.pages_skipped_due_to_sampling > 0 {
            notes.push(format!(
                "{} skipped: sampling",
                self.pages_skipped_due_to_sampling
            ));
        }
        if !notes.is_empty() {
            msg.push_str(&format!(" ({})", notes.join(", ")));
        }
        msg
    }
}

/// Complete output of a conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The assembled Markdown document.
    pub markdown: String,
    /// Per-page results in page order.
    pub pages: Vec<ExtractionResult>,
    pub profile: DocumentProfile,
    pub report: ConversionReport,
    /// Where the Markdown was written.
    pub markdown_path: PathBuf,
    /// Sidecar image directory, present when any image was written.
    pub images_dir: Option<PathBuf>,
}

/// `1234567` → `1,234,567`.
pub fn format_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ConversionReport {
        ConversionReport::new("a.pdf", Mode::Auto, ConversionMode::Hybrid, "fast", 4)
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(1234567), "1,234,567");
    }

    #[test]
    fn record_accumulates() {
        let mut r = report();
        let mut page = ExtractionResult::new(0);
        page.text = Some("héllo".into());
        page.image_paths = vec!["a_images/page_1_img_1.png".into()];
        page.warnings.push(PageError::AssetWriteFailure {
            page: 1,
            path: "x.png".into(),
            detail: "disk full".into(),
        });
        r.record(&page);
        r.record(&ExtractionResult::skipped(1, PageStatus::SkippedByBudget));
        r.record(&ExtractionResult::skipped(2, PageStatus::SkippedBySampling));

        assert_eq!(r.total_text_chars, 5);
        assert_eq!(r.total_images, 1);
        assert_eq!(r.pages_processed, 1);
        assert_eq!(r.pages_skipped_due_to_budget, 1);
        assert_eq!(r.pages_skipped_due_to_sampling, 1);
        assert_eq!(r.warnings.len(), 1);
        assert!(r.success());
    }

    #[test]
    fn all_failed_is_not_success() {
        let mut r = report();
        let mut page = ExtractionResult::new(0);
        page.error = Some(PageError::PageReadFailure {
            page: 1,
            detail: "broken".into(),
        });
        r.record(&page);
        assert!(!r.success());
        assert!(r.message().contains("1 failed"));
    }

    #[test]
    fn report_serialises() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["mode_used"], "hybrid");
        assert_eq!(json["requested_mode"], "auto");
    }
}
