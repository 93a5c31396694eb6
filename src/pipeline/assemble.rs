//! Markdown assembly: ordered per-page results in, one document out.
//!
//! Pure formatting. Extraction decisions are rendered as recorded, never
//! re-derived; the only judgement made here is suppressing text fragments
//! too short to be anything but noise.

use super::postprocess::finalize_document;
use crate::config::{ConversionMode, Mode};
use crate::output::{format_thousands, ConversionReport, ExtractionResult, PageStatus};
use std::borrow::Cow;
use std::fmt::Write;

pub const PLACEHOLDER_BUDGET: &str = "*[Page skipped: time budget exhausted]*";
pub const PLACEHOLDER_NOT_SAMPLED: &str = "*[Page appears to be image-based - not sampled]*";
pub const PLACEHOLDER_NO_CONTENT: &str = "*[No readable content found on this page]*";

/// Document-level facts for the header.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    /// File stem, used as the title.
    pub title: String,
    /// Source file name.
    pub source_name: String,
    /// Local time the conversion started, `YYYY-MM-DD HH:MM:SS`.
    pub generated_at: String,
    pub mode: ConversionMode,
    pub requested_mode: Mode,
    /// Pages eligible for expensive work when sampling applied, 1-based.
    pub sampled_pages: Option<Vec<usize>>,
    pub total_pages: usize,
}

/// Render the complete Markdown document.
///
/// `results` must hold one entry per page in ascending page order. Text
/// shorter than `min_render_chars` is left out.
pub fn assemble(
    results: &[ExtractionResult],
    meta: &DocumentMetadata,
    report: &ConversionReport,
    min_render_chars: usize,
) -> String {
    let mut doc = String::new();
    write_header(&mut doc, meta);
    for result in results {
        write_page(&mut doc, result, min_render_chars);
    }
    write_summary(&mut doc, report);
    finalize_document(&doc)
}

fn write_header(doc: &mut String, meta: &DocumentMetadata) {
    let _ = write!(
        doc,
        "# {}\n\n*Generated by pdf2md-hybrid - {}*\n\n\
         **Source:** `{}`  \n**Conversion Time:** {}  \n**Mode:** {} ({})\n\n",
        meta.title,
        meta.mode.description(),
        meta.source_name,
        meta.generated_at,
        meta.mode.label(),
        meta.requested_mode
    );
    if let Some(sampled) = &meta.sampled_pages {
        let _ = writeln!(
            doc,
            "> **Note:** large document. Rasterization and OCR were limited to {} of {} pages: {}.\n",
            sampled.len(),
            meta.total_pages,
            format_page_ranges(sampled)
        );
    }
    doc.push_str("---\n\n");
}

fn write_page(doc: &mut String, result: &ExtractionResult, min_render_chars: usize) {
    let page_num = result.page_num();
    let _ = write!(doc, "## Page {}\n\n", page_num);

    let mut rendered_any = false;
    if let Some(text) = result.text.as_deref() {
        if !text.is_empty() && text.chars().count() >= min_render_chars {
            doc.push_str(text);
            doc.push_str("\n\n");
            rendered_any = true;
        }
    }

    let mut image_no = 0;
    for reference in &result.image_paths {
        let target = link_destination(reference);
        if is_full_page_raster(reference) {
            let _ = write!(doc, "![Page {}]({})\n\n", page_num, target);
        } else {
            image_no += 1;
            let _ = write!(doc, "![Image {}]({})\n\n", image_no, target);
        }
        rendered_any = true;
    }

    if !rendered_any {
        let placeholder = match (&result.status, &result.error) {
            (PageStatus::SkippedByBudget, _) => PLACEHOLDER_BUDGET.to_string(),
            (PageStatus::SkippedBySampling, _) => PLACEHOLDER_NOT_SAMPLED.to_string(),
            (PageStatus::Processed, Some(e)) => {
                format!("*[Extraction failed for page {}: {}]*", page_num, e)
            }
            (PageStatus::Processed, None) => PLACEHOLDER_NO_CONTENT.to_string(),
        };
        doc.push_str(&placeholder);
        doc.push_str("\n\n");
    }

    doc.push_str("---\n\n");
}

fn write_summary(doc: &mut String, report: &ConversionReport) {
    let _ = write!(
        doc,
        "## Conversion Summary\n\n\
         **Mode:** {}  \n\
         **Text Characters:** {}  \n\
         **Images Extracted:** {}  \n\
         **Pages Processed:** {}/{}  \n\
         **Pages Skipped (budget):** {}  \n\
         **Pages Skipped (sampling):** {}  \n\
         **Processing Time:** {:.1}s\n\n---\n",
        report.mode_used.label(),
        format_thousands(report.total_text_chars),
        report.total_images,
        report.pages_processed,
        report.total_pages,
        report.pages_skipped_due_to_budget,
        report.pages_skipped_due_to_sampling,
        report.elapsed_ms as f64 / 1000.0
    );
}

/// A reference as a CommonMark link destination.
///
/// Bare destinations end at the first space and must balance parentheses, and
/// source file names routinely break both rules (`Report (1).pdf`). Those
/// references go in angle brackets, with `<`, `>` and `\` escaped. The file
/// on disk keeps its name.
fn link_destination(reference: &str) -> Cow<'_, str> {
    let needs_brackets = reference
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>' | '\\'));
    if !needs_brackets {
        return Cow::Borrowed(reference);
    }
    let mut target = String::with_capacity(reference.len() + 2);
    target.push('<');
    for c in reference.chars() {
        if matches!(c, '<' | '>' | '\\') {
            target.push('\\');
        }
        target.push(c);
    }
    target.push('>');
    Cow::Owned(target)
}

fn is_full_page_raster(reference: &str) -> bool {
    reference.ends_with("_full.png")
}

/// `[1, 2, 3, 7, 9, 10]` → `1-3, 7, 9-10`.
fn format_page_ranges(pages: &[usize]) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut iter = pages.iter().copied().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        parts.push(if start == end {
            start.to_string()
        } else {
            format!("{start}-{end}")
        });
    }
    parts.join(", ")
}
