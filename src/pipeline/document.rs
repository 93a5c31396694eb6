//! The document a run works on.

use crate::capability::CapabilitySet;
use crate::error::Pdf2MdError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Identity and size of the source PDF. Immutable once opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    /// File name including extension, e.g. `report.pdf`.
    pub name: String,
    /// File name without extension, used for output names.
    pub stem: String,
    pub file_size: u64,
    pub total_pages: usize,
}

impl Document {
    /// Count pages with the first text reader that can open the file.
    pub fn open(path: &Path, file_size: u64, caps: &CapabilitySet) -> Result<Self, Pdf2MdError> {
        let mut last_error = None;
        let mut total_pages = None;
        for reader in caps.text_readers() {
            match reader.page_count(path) {
                Ok(n) => {
                    debug!("{} counted {} pages", reader.name(), n);
                    total_pages = Some(n);
                    break;
                }
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        let total_pages = match (total_pages, last_error) {
            (Some(n), _) => n,
            (None, Some(detail)) => {
                return Err(Pdf2MdError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail,
                })
            }
            (None, None) => {
                return Err(Pdf2MdError::CapabilityUnavailable {
                    mode: "any".to_string(),
                    capability: "a PDF reader".to_string(),
                    hint: "No text-layer reader is configured.".to_string(),
                })
            }
        };
        if total_pages == 0 {
            return Err(Pdf2MdError::CorruptPdf {
                path: path.to_path_buf(),
                detail: "document has no pages".to_string(),
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        info!("Opened {} ({} pages, {} bytes)", name, total_pages, file_size);
        Ok(Self {
            path: path.to_path_buf(),
            name,
            stem,
            file_size,
            total_pages,
        })
    }
}
