//! Pure-Rust alternate reader built on `lopdf`.
//!
//! Used as redundancy behind pdfium: a different decoder with different
//! failure modes. It never needs a shared library, so it is always present in
//! a detected [`super::CapabilitySet`]. When pdfium is missing it also serves
//! embedded images, decoding the stream types that need no external codec:
//! DCT (JPEG) and 8-bit DeviceRGB / DeviceGray.

use super::{AssetExtractor, CapabilityError, EmbeddedImage, LastDocument, TextLayerReader};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

const BACKEND: &str = "lopdf";

/// lopdf-backed text layer and asset reader.
///
/// Parsing is the expensive part, so the last opened document is cached and
/// reused while consecutive calls target the same file.
pub struct LopdfBackend {
    password: Option<String>,
    cache: LastDocument<Arc<Document>>,
}

impl std::fmt::Debug for LopdfBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LopdfBackend")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl LopdfBackend {
    pub fn new(password: Option<String>) -> Self {
        Self {
            password,
            cache: LastDocument::new(),
        }
    }

    fn load(&self, path: &Path) -> Result<Arc<Document>, CapabilityError> {
        self.cache
            .with(path, |path| self.open(path), |doc| Ok(Arc::clone(doc)))
    }

    fn open(&self, path: &Path) -> Result<Arc<Document>, CapabilityError> {
        let mut doc = Document::load(path).map_err(|e| CapabilityError::Open {
            backend: BACKEND,
            detail: e.to_string(),
        })?;
        if doc.is_encrypted() {
            let password = self.password.as_deref().unwrap_or("");
            doc.decrypt(password).map_err(|e| CapabilityError::Open {
                backend: BACKEND,
                detail: format!("encrypted document: {e}"),
            })?;
            debug!("Decrypted {}", path.display());
        }
        Ok(Arc::new(doc))
    }

    fn page_id(doc: &Document, page_index: usize) -> Result<ObjectId, CapabilityError> {
        let number = page_number(page_index)?;
        doc.get_pages()
            .get(&number)
            .copied()
            .ok_or_else(|| CapabilityError::Open {
                backend: BACKEND,
                detail: format!("page {number} does not exist"),
            })
    }

    /// Image XObject streams of one page, in resource order.
    fn image_streams(doc: &Document, page_id: ObjectId) -> Vec<&lopdf::Stream> {
        let Some(resources) = page_resources(doc, page_id) else {
            return Vec::new();
        };
        let Ok(xobjects) = resources.get(b"XObject") else {
            return Vec::new();
        };
        let Some(xobjects) = resolve(doc, xobjects).and_then(|o| o.as_dict().ok()) else {
            return Vec::new();
        };

        xobjects
            .iter()
            .filter_map(|(_, obj)| match resolve(doc, obj) {
                Some(Object::Stream(stream)) if is_image(&stream.dict) => Some(stream),
                _ => None,
            })
            .collect()
    }
}

fn page_number(page_index: usize) -> Result<u32, CapabilityError> {
    u32::try_from(page_index + 1).map_err(|_| CapabilityError::Backend {
        backend: BACKEND,
        detail: format!("page index {page_index} out of range"),
    })
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Resources of a page, walking up the page tree for inherited entries.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    // Page trees are shallow; the bound guards against reference cycles.
    for _ in 0..32 {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve(doc, resources)?.as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?;
        node = resolve(doc, parent)?.as_dict().ok()?;
    }
    None
}

fn is_image(dict: &Dictionary) -> bool {
    dict.get(b"Subtype")
        .and_then(|o| o.as_name())
        .is_ok_and(|name| name == b"Image")
}

fn first_name<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a [u8]> {
    match resolve(doc, obj)? {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(items) => items.first().and_then(|o| first_name(doc, o)),
        _ => None,
    }
}

/// Decode one image XObject. `None` for codecs this backend does not carry.
fn decode_image(doc: &Document, stream: &lopdf::Stream) -> Option<DynamicImage> {
    let dict = &stream.dict;
    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;

    let filter = dict.get(b"Filter").ok().and_then(|f| first_name(doc, f));
    match filter {
        Some(b"DCTDecode") => {
            return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg).ok();
        }
        Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
            trace!("{width}x{height} image uses an unsupported filter");
            return None;
        }
        _ => {}
    }

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        return None;
    }
    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| first_name(doc, o))
        .unwrap_or(b"DeviceRGB");

    let pixels = (width as usize) * (height as usize);
    match color_space {
        b"DeviceRGB" | b"RGB" if data.len() >= pixels * 3 => {
            RgbImage::from_raw(width, height, data[..pixels * 3].to_vec())
                .map(DynamicImage::ImageRgb8)
        }
        b"DeviceGray" | b"G" if data.len() >= pixels => {
            GrayImage::from_raw(width, height, data[..pixels].to_vec())
                .map(DynamicImage::ImageLuma8)
        }
        _ => None,
    }
}

impl TextLayerReader for LopdfBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn page_count(&self, path: &Path) -> Result<usize, CapabilityError> {
        Ok(self.load(path)?.get_pages().len())
    }

    fn read_page_text(&self, path: &Path, page_index: usize) -> Result<String, CapabilityError> {
        let doc = self.load(path)?;
        Self::page_id(&doc, page_index)?;
        doc.extract_text(&[page_number(page_index)?])
            .map_err(|e| CapabilityError::Backend {
                backend: BACKEND,
                detail: format!("page {}: {e}", page_index + 1),
            })
    }
}

impl AssetExtractor for LopdfBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn count_images(&self, path: &Path, page_index: usize) -> Result<usize, CapabilityError> {
        let doc = self.load(path)?;
        let page_id = Self::page_id(&doc, page_index)?;
        Ok(Self::image_streams(&doc, page_id).len())
    }

    fn extract_images(
        &self,
        path: &Path,
        page_index: usize,
    ) -> Result<Vec<EmbeddedImage>, CapabilityError> {
        let doc = self.load(path)?;
        let page_id = Self::page_id(&doc, page_index)?;
        let images = Self::image_streams(&doc, page_id)
            .into_iter()
            .enumerate()
            .filter_map(|(object_index, stream)| {
                decode_image(&doc, stream).map(|image| EmbeddedImage {
                    object_index,
                    image,
                })
            })
            .collect();
        Ok(images)
    }
}
