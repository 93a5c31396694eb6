//! OCR through the `tesseract` executable.
//!
//! The engine is detected once at probe time; a missing binary leaves the OCR
//! slot empty instead of failing page by page.

use super::{command_available, CapabilityError, OcrEngine};
use image::{DynamicImage, ImageFormat};
use std::process::Command;
use tracing::{debug, trace};

/// Runs `tesseract <png> stdout --oem 3 --psm 6 -l <lang>` per image.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    command: String,
    language: String,
}

impl TesseractOcr {
    /// `Some` when `command --version` can be spawned.
    pub fn probe(command: &str, language: &str) -> Option<Self> {
        if !command_available(command, "--version") {
            debug!("{} not found; OCR unavailable", command);
            return None;
        }
        Some(Self::new(command, language))
    }

    /// Construct without probing. Failures then surface per call.
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }

    fn args(&self) -> [&str; 6] {
        // OEM 3: default engine. PSM 6: one uniform block of text.
        ["--oem", "3", "--psm", "6", "-l", self.language.as_str()]
    }
}

impl OcrEngine for TesseractOcr {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String, CapabilityError> {
        let input = tempfile::Builder::new()
            .prefix("pdf2md-ocr-")
            .suffix(".png")
            .tempfile()?;
        image
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|e| CapabilityError::Command {
                command: self.command.clone(),
                detail: format!("could not stage image: {e}"),
            })?;

        trace!("{} {} stdout {:?}", self.command, input.path().display(), self.args());
        let output = Command::new(&self.command)
            .arg(input.path())
            .arg("stdout")
            .args(self.args())
            .output()
            .map_err(|e| CapabilityError::Command {
                command: self.command.clone(),
                detail: if e.kind() == std::io::ErrorKind::NotFound {
                    "executable not found".to_string()
                } else {
                    e.to_string()
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CapabilityError::Command {
                command: self.command.clone(),
                detail: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_rejects_missing_binary() {
        assert!(TesseractOcr::probe("pdf2md-hybrid-no-tesseract", "eng").is_none());
    }

    #[test]
    fn missing_binary_is_a_command_error() {
        let ocr = TesseractOcr::new("pdf2md-hybrid-no-tesseract", "eng");
        let err = ocr.recognize(&DynamicImage::new_rgb8(4, 4)).unwrap_err();
        match err {
            CapabilityError::Command { detail, .. } => assert!(detail.contains("not found")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn language_is_passed_through() {
        let ocr = TesseractOcr::new("tesseract", "eng+ind");
        assert_eq!(ocr.args()[5], "eng+ind");
    }
}
