//! pdfium-backed native text layer, embedded-image extraction and rasterisation.
//!
//! ## One library, one open document
//!
//! The pdfium library is bound once per process and shared by every backend
//! instance; the first successful binding wins. With the `sync` feature of
//! `pdfium-render` all calls into the library go through one lock, so the
//! shared [`Pdfium`] and an open [`PdfDocument`] may be used from whichever
//! `spawn_blocking` thread Tokio picks. Each backend keeps the last document
//! it opened, so the several calls a page needs (classification, image
//! extraction, text, rendering) parse the file once per run.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Page sizes vary wildly: an A0 poster at 300 DPI would produce a
//! 10,000 × 14,000 px image. `max_pixels` caps the longest edge regardless of
//! physical size, keeping memory bounded.

use super::{
    AssetExtractor, CapabilityError, EmbeddedImage, LastDocument, Rasterizer, TextLayerReader,
};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

const BACKEND: &str = "pdfium";

static PDFIUM: OnceLock<Pdfium> = OnceLock::new();

/// Native reader built on `pdfium-render`.
#[derive(Clone)]
pub struct PdfiumBackend {
    pdfium: &'static Pdfium,
    password: Option<&'static str>,
    max_pixels: u32,
    documents: Arc<LastDocument<PdfDocument<'static>>>,
}

impl std::fmt::Debug for PdfiumBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfiumBackend")
            .field("password", &self.password.map(|_| "<redacted>"))
            .field("max_pixels", &self.max_pixels)
            .field("documents", &self.documents)
            .finish()
    }
}

impl PdfiumBackend {
    /// Locate and bind the pdfium library, unless an earlier call already did.
    ///
    /// Search order: `explicit` (file or directory), `PDFIUM_LIB_PATH`, the
    /// working directory, the system library path. Returns `None` when no
    /// candidate binds.
    pub fn probe(
        explicit: Option<&Path>,
        password: Option<String>,
        max_pixels: u32,
    ) -> Option<Self> {
        let pdfium = match PDFIUM.get() {
            Some(pdfium) => pdfium,
            None => {
                let bindings = bind_library(explicit)?;
                PDFIUM.get_or_init(|| Pdfium::new(bindings))
            }
        };

        Some(Self {
            pdfium,
            password: password.map(intern_password),
            max_pixels: max_pixels.max(100),
            documents: Arc::new(LastDocument::new()),
        })
    }

    fn open(&self, path: &Path) -> Result<PdfDocument<'static>, CapabilityError> {
        debug!("pdfium: opening {}", path.display());
        self.pdfium
            .load_pdf_from_file(path, self.password)
            .map_err(|e| CapabilityError::Open {
                backend: BACKEND,
                detail: format!("{e:?}"),
            })
    }

    fn with_document<R>(
        &self,
        path: &Path,
        f: impl FnOnce(&PdfDocument<'static>) -> Result<R, CapabilityError>,
    ) -> Result<R, CapabilityError> {
        self.documents.with(path, |path| self.open(path), f)
    }

    /// Run `f` against one page of the document at `path`.
    fn with_page<R>(
        &self,
        path: &Path,
        page_index: usize,
        f: impl FnOnce(&PdfPage<'_>) -> Result<R, PdfiumError>,
    ) -> Result<R, CapabilityError> {
        let index = u16::try_from(page_index).map_err(|_| CapabilityError::Backend {
            backend: BACKEND,
            detail: format!("page index {page_index} exceeds pdfium's range"),
        })?;
        self.with_document(path, |document| {
            let page = document.pages().get(index).map_err(|e| CapabilityError::Open {
                backend: BACKEND,
                detail: format!("page {}: {e:?}", page_index + 1),
            })?;
            f(&page).map_err(|e| CapabilityError::Backend {
                backend: BACKEND,
                detail: format!("page {}: {e:?}", page_index + 1),
            })
        })
    }
}

fn bind_library(explicit: Option<&Path>) -> Option<Box<dyn PdfiumLibraryBindings>> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(p) = explicit {
        candidates.push(library_file(p));
    }
    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        if !p.is_empty() {
            candidates.push(library_file(Path::new(&p)));
        }
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    candidates
        .into_iter()
        .find_map(|path| match Pdfium::bind_to_library(&path) {
            Ok(bindings) => {
                debug!("pdfium bound from {}", path.display());
                Some(bindings)
            }
            Err(e) => {
                debug!("pdfium not at {}: {:?}", path.display(), e);
                None
            }
        })
        .or_else(|| {
            let bindings = Pdfium::bind_to_system_library().ok()?;
            debug!("pdfium bound from the system library path");
            Some(bindings)
        })
}

/// pdfium borrows the password for as long as the document stays open, and
/// cached documents live for the process. Each distinct password is leaked
/// once and reused.
fn intern_password(password: String) -> &'static str {
    static SEEN: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());
    let mut seen = SEEN.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(known) = seen.iter().copied().find(|known| *known == password) {
        return known;
    }
    let leaked: &'static str = Box::leak(password.into_boxed_str());
    seen.push(leaked);
    leaked
}

/// Accept either the library file itself or the directory holding it.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

impl TextLayerReader for PdfiumBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn page_count(&self, path: &Path) -> Result<usize, CapabilityError> {
        self.with_document(path, |document| Ok(document.pages().len() as usize))
    }

    fn read_page_text(&self, path: &Path, page_index: usize) -> Result<String, CapabilityError> {
        self.with_page(path, page_index, |page| Ok(page.text()?.all()))
    }
}

impl AssetExtractor for PdfiumBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn count_images(&self, path: &Path, page_index: usize) -> Result<usize, CapabilityError> {
        self.with_page(path, page_index, |page| {
            Ok(page
                .objects()
                .iter()
                .filter(|object| object.as_image_object().is_some())
                .count())
        })
    }

    fn extract_images(
        &self,
        path: &Path,
        page_index: usize,
    ) -> Result<Vec<EmbeddedImage>, CapabilityError> {
        self.with_page(path, page_index, |page| {
            let mut images = Vec::new();
            let image_objects = page
                .objects()
                .iter()
                .filter(|object| object.as_image_object().is_some());
            for (object_index, object) in image_objects.enumerate() {
                let Some(image_object) = object.as_image_object() else {
                    continue;
                };
                match image_object.get_raw_image() {
                    Ok(image) => images.push(EmbeddedImage {
                        object_index,
                        image,
                    }),
                    Err(e) => debug!(
                        "page {}: image object {} not decodable: {:?}",
                        page_index + 1,
                        object_index + 1,
                        e
                    ),
                }
            }
            Ok(images)
        })
    }
}

impl Rasterizer for PdfiumBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn render_page(
        &self,
        path: &Path,
        page_index: usize,
        dpi: u32,
    ) -> Result<DynamicImage, CapabilityError> {
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(dpi as f32 / 72.0)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let image = self.with_page(path, page_index, |page| {
            Ok(page.render_with_config(&render_config)?.as_image())
        })?;
        debug!(
            "Rendered page {} at {} DPI → {}x{} px",
            page_index + 1,
            dpi,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}
