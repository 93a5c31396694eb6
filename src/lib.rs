//! # pdf2md-hybrid
//!
//! Convert PDF documents to Markdown by picking the cheapest extraction that
//! works for each page.
//!
//! ## Why this crate?
//!
//! Most PDFs carry a text layer that can be read in milliseconds. Scanned
//! pages don't, and OCR is two orders of magnitude slower. Running OCR on
//! everything wastes minutes on born-digital files; reading only the text
//! layer returns nothing for scans. This crate profiles the document first,
//! picks a mode, then walks a per-page fallback chain under a wall-clock
//! budget so a 900-page report still finishes.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Validate  exists, %PDF magic, size limit
//!  ├─ 2. Detect    pdfium / lopdf / pdftoppm / tesseract probed once
//!  ├─ 3. Analyze   classify every page (text / image / mixed / empty)
//!  ├─ 4. Select    Auto → HYBRID or OCR from the text ratio
//!  ├─ 5. Extract   per-page chain: native → alternate → rasterize → OCR
//!  │               (sampled on large docs, skipped once the budget is spent)
//!  ├─ 6. Assemble  header, one section per page, summary
//!  └─ 7. Output    <stem>_<mode>.md + <stem>_<mode>_images/
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2md_hybrid::{convert, ConversionConfig, Mode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .mode(Mode::Auto)
//!         .time_budget_secs(120)
//!         .build()?;
//!     let output = convert("document.pdf", &config).await?;
//!     eprintln!("{}", output.report.message());
//!     println!("{}", output.markdown_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2md-hybrid` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2md-hybrid = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! | Tool | Used for | Without it |
//! |------|----------|------------|
//! | libpdfium | text layer, embedded images, rendering | lopdf reads text; pdftoppm renders |
//! | `pdftoppm` | rendering when pdfium is absent (`pdfinfo` sizes the page) | no rasterization |
//! | `tesseract` | OCR | OCR mode unavailable; HYBRID keeps working |
//! | `pandoc` | `--format` other than `md` | Markdown only |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capability;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use capability::{
    AssetExtractor, CapabilityError, CapabilitySet, EmbeddedImage, OcrEngine, Rasterizer,
    TextLayerReader,
};
pub use config::{
    ConversionConfig, ConversionConfigBuilder, ConversionMode, Mode, PerformanceProfile,
};
pub use convert::{convert, convert_batch, convert_sync, detect_capabilities, inspect};
pub use error::{ErrorKind, PageError, Pdf2MdError};
pub use export::{export_markdown, OutputFormat};
pub use output::{
    ConversionOutput, ConversionReport, ExtractionMethod, ExtractionResult, PageStatus,
};
pub use pipeline::analyze::DocumentProfile;
pub use pipeline::classify::{PageCategory, PageClassification};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
