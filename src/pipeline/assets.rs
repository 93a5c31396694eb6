//! The sidecar image directory of one run.
//!
//! File names depend only on page and object indices, so a rerun over the same
//! document produces the same names and concurrent page workers never collide.

use crate::capability::AssetExtractor;
use crate::error::{PageError, Pdf2MdError};
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Owns `<output_dir>/<dir_name>/` for the duration of a run.
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
    dir_name: String,
}

impl AssetStore {
    pub fn new(output_dir: &Path, dir_name: impl Into<String>) -> Self {
        let dir_name = dir_name.into();
        Self {
            dir: output_dir.join(&dir_name),
            dir_name,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Clear leftovers from a previous run and recreate the directory.
    pub fn prepare(&self) -> Result<(), Pdf2MdError> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir).map_err(|e| Pdf2MdError::OutputWriteFailed {
                path: self.dir.clone(),
                source: e,
            })?;
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| Pdf2MdError::OutputWriteFailed {
            path: self.dir.clone(),
            source: e,
        })
    }

    /// Remove the directory again if the run wrote nothing into it.
    /// Returns whether the directory is kept.
    pub fn finish(&self) -> bool {
        let empty = std::fs::read_dir(&self.dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if empty {
            if let Err(e) = std::fs::remove_dir(&self.dir) {
                debug!("Could not remove empty {}: {}", self.dir.display(), e);
                return true;
            }
            return false;
        }
        self.dir.exists()
    }

    /// `page_<n>_img_<k>.png`, 1-based.
    pub fn embedded_file_name(page_index: usize, object_index: usize) -> String {
        format!("page_{}_img_{}.png", page_index + 1, object_index + 1)
    }

    /// `page_<n>_full.png`, 1-based.
    pub fn full_page_file_name(page_index: usize) -> String {
        format!("page_{}_full.png", page_index + 1)
    }

    /// Write `image` as PNG and return its reference relative to the
    /// Markdown file.
    pub fn save(
        &self,
        page_index: usize,
        file_name: &str,
        image: &DynamicImage,
    ) -> Result<String, PageError> {
        let reference = format!("{}/{}", self.dir_name, file_name);
        let path = self.dir.join(file_name);
        match image.save_with_format(&path, ImageFormat::Png) {
            Ok(()) => {
                debug!("Saved {}", path.display());
                Ok(reference)
            }
            Err(e) => {
                // A partially written file must not outlive the failure.
                let _ = std::fs::remove_file(&path);
                Err(PageError::AssetWriteFailure {
                    page: page_index + 1,
                    path: reference,
                    detail: e.to_string(),
                })
            }
        }
    }

    /// Extract and save every non-decorative embedded image of a page.
    ///
    /// Images narrower or shorter than `min_px` are dropped. Returns the saved
    /// references in object order plus any non-fatal problems.
    pub fn save_embedded(
        &self,
        extractor: &dyn AssetExtractor,
        pdf: &Path,
        page_index: usize,
        min_px: u32,
    ) -> (Vec<String>, Vec<PageError>) {
        let images = match extractor.extract_images(pdf, page_index) {
            Ok(images) => images,
            Err(e) => {
                warn!("Page {}: embedded images unavailable: {}", page_index + 1, e);
                return (
                    Vec::new(),
                    vec![PageError::ExtractionFailure {
                        page: page_index + 1,
                        method: "embedded images".to_string(),
                        detail: e.to_string(),
                    }],
                );
            }
        };

        let mut saved = Vec::new();
        let mut problems = Vec::new();
        for embedded in images {
            let (w, h) = (embedded.image.width(), embedded.image.height());
            if w < min_px || h < min_px {
                debug!(
                    "Page {}: dropping decorative {}x{} image {}",
                    page_index + 1,
                    w,
                    h,
                    embedded.object_index + 1
                );
                continue;
            }
            let name = Self::embedded_file_name(page_index, embedded.object_index);
            match self.save(page_index, &name, &embedded.image) {
                Ok(reference) => saved.push(reference),
                Err(e) => {
                    warn!("{}", e);
                    problems.push(e);
                }
            }
        }
        (saved, problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityError, EmbeddedImage};

    struct TwoImages;
    impl AssetExtractor for TwoImages {
        fn name(&self) -> &'static str {
            "fake"
        }
        fn count_images(&self, _: &Path, _: usize) -> Result<usize, CapabilityError> {
            Ok(2)
        }
        fn extract_images(
            &self,
            _: &Path,
            _: usize,
        ) -> Result<Vec<EmbeddedImage>, CapabilityError> {
            Ok(vec![
                EmbeddedImage {
                    object_index: 0,
                    image: DynamicImage::new_rgb8(16, 16),
                },
                EmbeddedImage {
                    object_index: 1,
                    image: DynamicImage::new_rgb8(400, 300),
                },
            ])
        }
    }

    #[test]
    fn names_are_one_based() {
        assert_eq!(AssetStore::embedded_file_name(0, 0), "page_1_img_1.png");
        assert_eq!(AssetStore::full_page_file_name(9), "page_10_full.png");
    }

    #[test]
    fn prepare_clears_previous_run() {
        let out = tempfile::tempdir().unwrap();
        let store = AssetStore::new(out.path(), "doc_hybrid_images");
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join("stale.png"), b"x").unwrap();
        store.prepare().unwrap();
        assert!(store.dir().exists());
        assert!(!store.dir().join("stale.png").exists());
    }

    #[test]
    fn decorative_images_are_dropped() {
        let out = tempfile::tempdir().unwrap();
        let store = AssetStore::new(out.path(), "doc_hybrid_images");
        store.prepare().unwrap();
        let (saved, problems) = store.save_embedded(&TwoImages, Path::new("doc.pdf"), 1, 50);
        assert!(problems.is_empty());
        assert_eq!(saved, vec!["doc_hybrid_images/page_2_img_2.png".to_string()]);
        assert!(store.dir().join("page_2_img_2.png").exists());
        assert!(store.finish());
    }

    #[test]
    fn write_failure_is_reported() {
        let out = tempfile::tempdir().unwrap();
        let store = AssetStore::new(out.path(), "never_created");
        let err = store
            .save(0, "page_1_full.png", &DynamicImage::new_rgb8(8, 8))
            .unwrap_err();
        assert!(matches!(err, PageError::AssetWriteFailure { page: 1, .. }));
    }

    #[test]
    fn finish_removes_empty_dir() {
        let out = tempfile::tempdir().unwrap();
        let store = AssetStore::new(out.path(), "empty_images");
        store.prepare().unwrap();
        assert!(!store.finish());
        assert!(!store.dir().exists());
    }
}
