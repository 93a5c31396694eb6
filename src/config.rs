//! Configuration types for adaptive PDF-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. A config is cheap to clone and is
//! shared read-only by every page worker of a run.
//!
//! Cost/coverage thresholds live in a [`PerformanceProfile`]. Two presets
//! exist: [`PerformanceProfile::fast`] samples large documents and renders at
//! modest DPI, [`PerformanceProfile::thorough`] never samples and renders at
//! print resolution.

use crate::capability::CapabilitySet;
use crate::error::Pdf2MdError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration for a PDF-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2md_hybrid::{ConversionConfig, Mode};
///
/// let config = ConversionConfig::builder()
///     .mode(Mode::Hybrid)
///     .time_budget_secs(120)
///     .output_dir("converted")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Requested mode. Default: [`Mode::Auto`].
    ///
    /// `Auto` is resolved once from the document profile, before any page
    /// work starts. An explicit mode is honoured even when the profile
    /// recommends the other one.
    pub mode: Mode,

    /// Thresholds for sampling, DPI and usable-text detection.
    pub profile: PerformanceProfile,

    /// Wall-clock budget for the whole run in seconds. Default: 300.
    ///
    /// Checked before every unit of page-level work. Zero is valid and
    /// produces a document made only of "skipped" placeholders.
    pub time_budget_secs: u64,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4000.
    ///
    /// A safety cap independent of DPI: a 300-DPI render of an A0 poster
    /// would otherwise allocate hundreds of megabytes.
    pub max_rendered_pixels: u32,

    /// Number of pages processed concurrently. Default: 1.
    ///
    /// Sequential processing keeps the budget exhaustion point deterministic.
    /// Raise it on multi-core hosts when OCR dominates the run time.
    pub concurrency: usize,

    /// Directory receiving the Markdown file and its image sidecar directory.
    /// Default: `output`.
    pub output_dir: PathBuf,

    /// Embedded images narrower or shorter than this are dropped as decorative. Default: 50.
    pub min_image_px: u32,

    /// Page text shorter than this (in chars) is not rendered. Default: 10.
    pub min_render_chars: usize,

    /// Inputs above this size are rejected up front. Default: 100.
    pub max_file_size_mb: u64,

    /// Tesseract language code(s), e.g. `eng` or `eng+ind`. Default: `eng`.
    pub ocr_language: String,

    /// Tesseract executable name or path. Default: `tesseract`.
    pub tesseract_cmd: String,

    /// Explicit pdfium library (file or directory). Falls back to
    /// `PDFIUM_LIB_PATH`, the working directory, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Pre-built capability set. Takes precedence over host detection.
    pub capabilities: Option<CapabilitySet>,

    /// Optional per-page progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            profile: PerformanceProfile::default(),
            time_budget_secs: 300,
            max_rendered_pixels: 4000,
            concurrency: 1,
            output_dir: PathBuf::from("output"),
            min_image_px: 50,
            min_render_chars: 10,
            max_file_size_mb: 100,
            ocr_language: "eng".to_string(),
            tesseract_cmd: "tesseract".to_string(),
            pdfium_lib_path: None,
            password: None,
            capabilities: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("mode", &self.mode)
            .field("profile", &self.profile)
            .field("time_budget_secs", &self.time_budget_secs)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("output_dir", &self.output_dir)
            .field("min_image_px", &self.min_image_px)
            .field("min_render_chars", &self.min_render_chars)
            .field("max_file_size_mb", &self.max_file_size_mb)
            .field("ocr_language", &self.ocr_language)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "capabilities",
                &self.capabilities.as_ref().map(|_| "<CapabilitySet>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Replace the whole profile. Apply before the per-field setters below.
    pub fn profile(mut self, profile: PerformanceProfile) -> Self {
        self.config.profile = profile;
        self
    }

    pub fn time_budget_secs(mut self, secs: u64) -> Self {
        self.config.time_budget_secs = secs;
        self
    }

    /// DPI for full-page rasters kept as images (Hybrid mode).
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.profile.raster_dpi = dpi.clamp(72, 400);
        self
    }

    /// DPI for rasters fed to the OCR engine.
    pub fn ocr_dpi(mut self, dpi: u32) -> Self {
        self.config.profile.ocr_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn sample_cap(mut self, n: usize) -> Self {
        self.config.profile.sample_cap = n.max(1);
        self
    }

    pub fn sample_head(mut self, n: usize) -> Self {
        self.config.profile.sample_head = n;
        self
    }

    pub fn sample_tail(mut self, n: usize) -> Self {
        self.config.profile.sample_tail = n;
        self
    }

    /// Page count above which a Hybrid run samples visual work. `None` disables.
    pub fn large_page_threshold(mut self, pages: Option<usize>) -> Self {
        self.config.profile.large_page_threshold = pages;
        self
    }

    /// Page count above which an OCR run samples. `None` disables.
    pub fn ocr_sampling_threshold(mut self, pages: Option<usize>) -> Self {
        self.config.profile.ocr_sampling_threshold = pages;
        self
    }

    pub fn min_image_px(mut self, px: u32) -> Self {
        self.config.min_image_px = px;
        self
    }

    pub fn min_render_chars(mut self, n: usize) -> Self {
        self.config.min_render_chars = n;
        self
    }

    pub fn max_file_size_mb(mut self, mb: u64) -> Self {
        self.config.max_file_size_mb = mb.max(1);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn capabilities(mut self, caps: CapabilitySet) -> Self {
        self.config.capabilities = Some(caps);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2MdError> {
        let c = &self.config;
        if c.profile.raster_dpi < 72 || c.profile.ocr_dpi < 72 {
            return Err(Pdf2MdError::InvalidConfig(format!(
                "DPI must be at least 72, got {}/{}",
                c.profile.raster_dpi, c.profile.ocr_dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(Pdf2MdError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(Pdf2MdError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(Pdf2MdError::InvalidConfig(
                "Output directory must not be empty".into(),
            ));
        }
        if c.profile.hybrid_ratio_threshold < c.profile.ocr_ratio_threshold {
            return Err(Pdf2MdError::InvalidConfig(format!(
                "Hybrid ratio threshold {} is below the OCR threshold {}",
                c.profile.hybrid_ratio_threshold, c.profile.ocr_ratio_threshold
            )));
        }
        Ok(self.config)
    }
}

// ── Performance profile ──────────────────────────────────────────────────

/// Cost/coverage thresholds shared by the analyzer, sampler and chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceProfile {
    /// Preset name, for reports.
    pub name: String,
    /// Hybrid runs sample visual work above this page count.
    pub large_page_threshold: Option<usize>,
    /// Hybrid runs sample visual work above this file size.
    pub large_file_bytes: Option<u64>,
    /// OCR runs sample above this page count.
    pub ocr_sampling_threshold: Option<usize>,
    /// Leading pages always sampled.
    pub sample_head: usize,
    /// Trailing pages always sampled.
    pub sample_tail: usize,
    /// Cap on head + needs-visual pages.
    pub sample_cap: usize,
    /// DPI for full-page rasters kept as images.
    pub raster_dpi: u32,
    /// DPI for rasters fed to OCR.
    pub ocr_dpi: u32,
    /// A page carries meaningful text above this many chars.
    pub classifier_text_threshold: usize,
    /// Text-layer output below this is not usable in Hybrid mode.
    pub hybrid_min_text_chars: usize,
    /// Text-layer output below this is not usable in Ocr mode.
    pub ocr_min_text_chars: usize,
    /// `text_ratio` above this recommends Hybrid.
    pub hybrid_ratio_threshold: f64,
    /// `text_ratio` below this recommends Ocr.
    pub ocr_ratio_threshold: f64,
}

impl PerformanceProfile {
    /// Samples large documents, renders at screen resolution.
    pub fn fast() -> Self {
        Self {
            name: "fast".to_string(),
            large_page_threshold: Some(50),
            large_file_bytes: Some(20 * 1024 * 1024),
            ocr_sampling_threshold: Some(20),
            sample_head: 5,
            sample_tail: 3,
            sample_cap: 20,
            raster_dpi: 150,
            ocr_dpi: 200,
            classifier_text_threshold: 100,
            hybrid_min_text_chars: 50,
            ocr_min_text_chars: 100,
            hybrid_ratio_threshold: 0.7,
            ocr_ratio_threshold: 0.3,
        }
    }

    /// Never samples, renders at print resolution.
    pub fn thorough() -> Self {
        Self {
            name: "thorough".to_string(),
            large_page_threshold: None,
            large_file_bytes: None,
            ocr_sampling_threshold: None,
            raster_dpi: 200,
            ocr_dpi: 300,
            ..Self::fast()
        }
    }

    /// Whether a Hybrid run over this document should sample.
    pub fn is_large_for_hybrid(&self, total_pages: usize, file_size: u64) -> bool {
        self.large_page_threshold.is_some_and(|t| total_pages > t)
            || self.large_file_bytes.is_some_and(|t| file_size > t)
    }

    /// Whether an OCR run over this document should sample.
    pub fn is_large_for_ocr(&self, total_pages: usize) -> bool {
        self.ocr_sampling_threshold.is_some_and(|t| total_pages > t)
    }
}

impl Default for PerformanceProfile {
    fn default() -> Self {
        Self::fast()
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Requested conversion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Pick Hybrid or Ocr from the document profile. (default)
    #[default]
    Auto,
    /// Keep the text layer, save embedded images, rasterise image-only pages.
    Hybrid,
    /// Turn everything into text, running OCR where the text layer is poor.
    Ocr,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Auto => "auto",
            Mode::Hybrid => "hybrid",
            Mode::Ocr => "ocr",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Pdf2MdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Mode::Auto),
            "hybrid" | "md-hybrid" => Ok(Mode::Hybrid),
            "ocr" | "md-ocr" => Ok(Mode::Ocr),
            other => Err(Pdf2MdError::InvalidConfig(format!(
                "Unknown mode '{other}' (expected auto, hybrid or ocr)"
            ))),
        }
    }
}

/// The mode a run actually executes. `Auto` never reaches page processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    Hybrid,
    Ocr,
}

impl ConversionMode {
    /// Lowercase tag used in file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionMode::Hybrid => "hybrid",
            ConversionMode::Ocr => "ocr",
        }
    }

    /// Uppercase label used in the document header and summary.
    pub fn label(&self) -> &'static str {
        match self {
            ConversionMode::Hybrid => "HYBRID",
            ConversionMode::Ocr => "OCR",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConversionMode::Hybrid => "Hybrid Mode - Text and Images Preserved",
            ConversionMode::Ocr => "OCR Mode - All Content as Text",
        }
    }
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Mode {
    /// Resolve against a recommendation. Explicit modes always win.
    pub fn resolve(self, recommended: ConversionMode) -> ConversionMode {
        match self {
            Mode::Auto => recommended,
            Mode::Hybrid => ConversionMode::Hybrid,
            Mode::Ocr => ConversionMode::Ocr,
        }
    }
}
