//! External collaborators the pipeline consumes, and the set that carries them.
//!
//! Nothing in the pipeline asks the host what is installed. Detection happens
//! once in [`CapabilitySet::detect`]; the resulting set is passed to the
//! orchestrator, and each stage uses only the slots it needs. An empty slot is
//! a configuration fact, not an error.
//!
//! | Slot | Trait | Backends |
//! |------|-------|----------|
//! | `text_layer` | [`TextLayerReader`] | [`pdfium::PdfiumBackend`] |
//! | `alternate_text_layer` | [`TextLayerReader`] | [`lopdf_backend::LopdfBackend`] |
//! | `assets` | [`AssetExtractor`] | pdfium, else lopdf |
//! | `rasterizer` | [`Rasterizer`] | pdfium, else [`pdftoppm::PdftoppmRasterizer`] |
//! | `ocr` | [`OcrEngine`] | [`tesseract::TesseractOcr`] |
//!
//! All methods are blocking; callers run them on `spawn_blocking` threads.

pub mod lopdf_backend;
pub mod pdfium;
pub mod pdftoppm;
pub mod tesseract;

use crate::config::{ConversionConfig, ConversionMode};
use crate::error::Pdf2MdError;
use image::DynamicImage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// Failure inside one collaborator call.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The document or page could not be opened by this backend.
    #[error("{backend}: cannot open: {detail}")]
    Open { backend: &'static str, detail: String },

    /// The backend opened the page but the operation failed.
    #[error("{backend}: {detail}")]
    Backend { backend: &'static str, detail: String },

    /// An external executable could not be spawned or exited non-zero.
    #[error("{command}: {detail}")]
    Command { command: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads the machine-readable text of a page.
pub trait TextLayerReader: Send + Sync {
    /// Short backend name used in logs and reports.
    fn name(&self) -> &'static str;

    fn page_count(&self, path: &Path) -> Result<usize, CapabilityError>;

    /// Text of one page (0-based index), unprocessed.
    fn read_page_text(&self, path: &Path, page_index: usize) -> Result<String, CapabilityError>;
}

/// A raster object placed on a page by the document's producer.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// Position among the page's image objects, 0-based, in content order.
    pub object_index: usize,
    pub image: DynamicImage,
}

/// Counts and decodes embedded raster objects.
pub trait AssetExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn count_images(&self, path: &Path, page_index: usize) -> Result<usize, CapabilityError>;

    /// Every decodable image on the page, in object order.
    fn extract_images(
        &self,
        path: &Path,
        page_index: usize,
    ) -> Result<Vec<EmbeddedImage>, CapabilityError>;
}

/// Renders a page to pixels.
pub trait Rasterizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn render_page(
        &self,
        path: &Path,
        page_index: usize,
        dpi: u32,
    ) -> Result<DynamicImage, CapabilityError>;
}

/// Derives text from pixels.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn recognize(&self, image: &DynamicImage) -> Result<String, CapabilityError>;
}

/// The collaborators available to one conversion run.
#[derive(Clone, Default)]
pub struct CapabilitySet {
    pub text_layer: Option<Arc<dyn TextLayerReader>>,
    pub alternate_text_layer: Option<Arc<dyn TextLayerReader>>,
    pub assets: Option<Arc<dyn AssetExtractor>>,
    pub rasterizer: Option<Arc<dyn Rasterizer>>,
    pub ocr: Option<Arc<dyn OcrEngine>>,
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("CapabilitySet");
        for (slot, backend) in self.summary() {
            d.field(slot, &backend.unwrap_or("unavailable"));
        }
        d.finish()
    }
}

impl CapabilitySet {
    /// A set with every slot empty.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Probe the host once.
    ///
    /// pdfium covers text, assets and rasterisation when its library binds;
    /// lopdf is always present as the alternate reader; `pdftoppm` fills the
    /// rasterizer slot when pdfium is missing; `tesseract` fills the OCR slot.
    pub fn detect(config: &ConversionConfig) -> Self {
        let mut caps = Self::empty();

        let lopdf = Arc::new(lopdf_backend::LopdfBackend::new(config.password.clone()));
        caps.alternate_text_layer = Some(lopdf.clone() as Arc<dyn TextLayerReader>);

        match pdfium::PdfiumBackend::probe(
            config.pdfium_lib_path.as_deref(),
            config.password.clone(),
            config.max_rendered_pixels,
        ) {
            Some(pdfium) => {
                let pdfium = Arc::new(pdfium);
                caps.text_layer = Some(pdfium.clone() as Arc<dyn TextLayerReader>);
                caps.assets = Some(pdfium.clone() as Arc<dyn AssetExtractor>);
                caps.rasterizer = Some(pdfium as Arc<dyn Rasterizer>);
            }
            None => {
                debug!("pdfium not bound; falling back to lopdf assets and pdftoppm");
                caps.assets = Some(lopdf as Arc<dyn AssetExtractor>);
                if let Some(r) = pdftoppm::PdftoppmRasterizer::probe(
                    config.password.clone(),
                    config.max_rendered_pixels,
                ) {
                    caps.rasterizer = Some(Arc::new(r) as Arc<dyn Rasterizer>);
                }
            }
        }

        if let Some(ocr) =
            tesseract::TesseractOcr::probe(&config.tesseract_cmd, &config.ocr_language)
        {
            caps.ocr = Some(Arc::new(ocr) as Arc<dyn OcrEngine>);
        }

        info!("Capabilities: {:?}", caps);
        caps
    }

    pub fn with_text_layer(mut self, reader: Arc<dyn TextLayerReader>) -> Self {
        self.text_layer = Some(reader);
        self
    }

    pub fn with_alternate_text_layer(mut self, reader: Arc<dyn TextLayerReader>) -> Self {
        self.alternate_text_layer = Some(reader);
        self
    }

    pub fn with_assets(mut self, assets: Arc<dyn AssetExtractor>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    /// Text readers in preference order: native first, then alternate.
    pub fn text_readers(&self) -> impl Iterator<Item = &Arc<dyn TextLayerReader>> {
        self.text_layer
            .iter()
            .chain(self.alternate_text_layer.iter())
    }

    /// `(slot, backend name)` pairs in a fixed order.
    pub fn summary(&self) -> Vec<(&'static str, Option<&'static str>)> {
        vec![
            ("text_layer", self.text_layer.as_ref().map(|c| c.name())),
            (
                "alternate_text_layer",
                self.alternate_text_layer.as_ref().map(|c| c.name()),
            ),
            ("assets", self.assets.as_ref().map(|c| c.name())),
            ("rasterizer", self.rasterizer.as_ref().map(|c| c.name())),
            ("ocr", self.ocr.as_ref().map(|c| c.name())),
        ]
    }

    /// Fail fast when the selected mode has nothing to work with.
    ///
    /// Ocr needs both a rasterizer and an OCR engine. Hybrid needs at least
    /// one way to produce content: a text reader or a rasterizer.
    pub fn ensure_supports(&self, mode: ConversionMode) -> Result<(), Pdf2MdError> {
        match mode {
            ConversionMode::Ocr => {
                if self.rasterizer.is_none() {
                    return Err(Pdf2MdError::CapabilityUnavailable {
                        mode: mode.label().to_string(),
                        capability: "a page rasterizer".to_string(),
                        hint: "Provide libpdfium (PDFIUM_LIB_PATH) or install poppler-utils (pdftoppm).".to_string(),
                    });
                }
                if self.ocr.is_none() {
                    return Err(Pdf2MdError::CapabilityUnavailable {
                        mode: mode.label().to_string(),
                        capability: "an OCR engine".to_string(),
                        hint: "Install tesseract-ocr and make sure `tesseract --version` runs.".to_string(),
                    });
                }
                Ok(())
            }
            ConversionMode::Hybrid => {
                if self.text_readers().next().is_none() && self.rasterizer.is_none() {
                    return Err(Pdf2MdError::CapabilityUnavailable {
                        mode: mode.label().to_string(),
                        capability: "a text-layer reader or a page rasterizer".to_string(),
                        hint: "Provide libpdfium (PDFIUM_LIB_PATH).".to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Whether `command` can be spawned. Some tools print their version to
/// stderr and exit non-zero, so any output counts.
pub(crate) fn command_available(command: &str, version_arg: &str) -> bool {
    std::process::Command::new(command)
        .arg(version_arg)
        .output()
        .map(|o| o.status.success() || !o.stderr.is_empty())
        .unwrap_or(false)
}

/// The most recently opened document of a backend.
///
/// Every page-level call names its file, and a run touches one file several
/// times per page. Consecutive calls on the same path share one open; a call
/// on a different path closes the old document before opening the new one.
pub(crate) struct LastDocument<D> {
    slot: Mutex<Option<(PathBuf, D)>>,
}

impl<D> LastDocument<D> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Run `f` against the document at `path`, calling `open` only when the
    /// cached document belongs to another file (or an open failed before).
    pub(crate) fn with<R>(
        &self,
        path: &Path,
        open: impl FnOnce(&Path) -> Result<D, CapabilityError>,
        f: impl FnOnce(&D) -> Result<R, CapabilityError>,
    ) -> Result<R, CapabilityError> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let document = match slot.take() {
            Some((cached, document)) if cached == path => document,
            stale => {
                drop(stale);
                open(path)?
            }
        };
        let result = f(&document);
        *slot = Some((path.to_path_buf(), document));
        result
    }
}

impl<D> fmt::Debug for LastDocument<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("LastDocument");
        match self.slot.try_lock() {
            Ok(slot) => debug.field("path", &slot.as_ref().map(|(path, _)| path.clone())),
            Err(_) => debug.field("path", &"<in use>"),
        };
        debug.finish()
    }
}
