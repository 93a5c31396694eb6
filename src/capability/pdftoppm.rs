//! Page rasterisation through poppler's `pdftoppm`.
//!
//! Fills the rasterizer slot on hosts without libpdfium. Each call renders a
//! single page into a scratch directory and decodes the PNG back.
//!
//! The longest edge is capped at `max_pixels`, as with pdfium. `pdftoppm`
//! cannot combine a DPI with an upper bound (`-scale-to` replaces the DPI and
//! enlarges small pages), so the page size is read with `pdfinfo` from the
//! same poppler install and the DPI lowered to fit. When `pdfinfo` gives no
//! answer the decoded image is downscaled instead.

use super::{command_available, CapabilityError, Rasterizer};
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::Path;
use std::process::Command;
use tracing::debug;

const COMMAND: &str = "pdftoppm";
const INFO_COMMAND: &str = "pdfinfo";

#[derive(Clone)]
pub struct PdftoppmRasterizer {
    password: Option<String>,
    max_pixels: u32,
}

impl std::fmt::Debug for PdftoppmRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdftoppmRasterizer")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_pixels", &self.max_pixels)
            .finish()
    }
}

impl PdftoppmRasterizer {
    pub fn probe(password: Option<String>, max_pixels: u32) -> Option<Self> {
        if !command_available(COMMAND, "-v") {
            debug!("pdftoppm not found");
            return None;
        }
        Some(Self {
            password,
            max_pixels: max_pixels.max(100),
        })
    }

    /// Page size in points from `pdfinfo`, `None` on any failure.
    fn page_size_points(&self, path: &Path, page: &str) -> Option<(f32, f32)> {
        let mut cmd = Command::new(INFO_COMMAND);
        cmd.args(["-f", page, "-l", page]);
        if let Some(pw) = &self.password {
            cmd.arg("-upw").arg(pw);
        }
        let output = cmd.arg(path).output().ok()?;
        if !output.status.success() {
            return None;
        }
        parse_page_size(&String::from_utf8_lossy(&output.stdout))
    }
}

/// The `size:` line of `pdfinfo` output: `Page    3 size: 612 x 792 pts (letter)`.
fn parse_page_size(stdout: &str) -> Option<(f32, f32)> {
    let line = stdout.lines().find(|l| l.starts_with("Page") && l.contains("size:"))?;
    let (_, dims) = line.split_once("size:")?;
    let mut parts = dims.split_whitespace();
    let width: f32 = parts.next()?.parse().ok()?;
    if parts.next()? != "x" {
        return None;
    }
    let height: f32 = parts.next()?.parse().ok()?;
    (width > 0.0 && height > 0.0).then_some((width, height))
}

/// Highest DPI at or below `dpi` whose longest edge fits in `max_pixels`.
fn capped_dpi(dpi: u32, max_pixels: u32, page_points: (f32, f32)) -> u32 {
    let longest_inches = page_points.0.max(page_points.1) / 72.0;
    let fitting = (max_pixels as f32 / longest_inches).floor() as u32;
    dpi.min(fitting).max(1)
}

impl Rasterizer for PdftoppmRasterizer {
    fn name(&self) -> &'static str {
        COMMAND
    }

    fn render_page(
        &self,
        path: &Path,
        page_index: usize,
        dpi: u32,
    ) -> Result<DynamicImage, CapabilityError> {
        let scratch = tempfile::tempdir()?;
        let stem = scratch.path().join("page");
        let page = (page_index + 1).to_string();

        let dpi = match self.page_size_points(path, &page) {
            Some(size) => {
                let capped = capped_dpi(dpi, self.max_pixels, size);
                if capped < dpi {
                    debug!(
                        "page {}: {}x{} pt, rendering at {} DPI instead of {}",
                        page, size.0, size.1, capped, dpi
                    );
                }
                capped
            }
            None => dpi,
        };
        let dpi_arg = dpi.to_string();

        let mut cmd = Command::new(COMMAND);
        cmd.args(["-f", page.as_str(), "-l", page.as_str(), "-r", dpi_arg.as_str()])
            .args(["-png", "-singlefile"]);
        if let Some(pw) = &self.password {
            cmd.arg("-upw").arg(pw);
        }
        cmd.arg(path).arg(&stem);

        let output = cmd.output().map_err(|e| CapabilityError::Command {
            command: COMMAND.to_string(),
            detail: if e.kind() == std::io::ErrorKind::NotFound {
                "executable not found".to_string()
            } else {
                e.to_string()
            },
        })?;
        if !output.status.success() {
            return Err(CapabilityError::Command {
                command: COMMAND.to_string(),
                detail: format!(
                    "page {page}: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let png = stem.with_extension("png");
        let image = image::open(&png).map_err(|e| CapabilityError::Command {
            command: COMMAND.to_string(),
            detail: format!("page {page}: unreadable output: {e}"),
        })?;
        Ok(fit_within(image, self.max_pixels))
    }
}

fn fit_within(image: DynamicImage, max_pixels: u32) -> DynamicImage {
    if image.width().max(image.height()) <= max_pixels {
        return image;
    }
    image.resize(max_pixels, max_pixels, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDFINFO_OUTPUT: &str = "\
Producer:       pdfTeX-1.40.25
Pages:          15
Page    3 size: 612 x 792 pts (letter)
Page    3 rot:  0
File size:      2215244 bytes
";

    #[test]
    fn reads_page_size_line() {
        assert_eq!(parse_page_size(PDFINFO_OUTPUT), Some((612.0, 792.0)));
        assert_eq!(
            parse_page_size("Page size:      595.276 x 841.89 pts (A4)\n"),
            Some((595.276, 841.89))
        );
        assert_eq!(parse_page_size("Pages: 3\n"), None);
        assert_eq!(parse_page_size("Page    1 size: 0 x 0 pts\n"), None);
    }

    #[test]
    fn letter_page_keeps_requested_dpi() {
        // 11 in × 300 DPI = 3300 px, under the cap.
        assert_eq!(capped_dpi(300, 4000, (612.0, 792.0)), 300);
    }

    #[test]
    fn poster_page_is_capped() {
        // A0 is 2384 × 3370 pt; 3370 / 72 ≈ 46.8 in, so 4000 px allows 85 DPI.
        let dpi = capped_dpi(300, 4000, (2384.0, 3370.0));
        assert_eq!(dpi, 85);
        assert!((3370.0 / 72.0 * dpi as f32) <= 4000.0);
    }

    #[test]
    fn oversized_decode_is_downscaled() {
        let image = fit_within(DynamicImage::new_rgb8(1000, 400), 500);
        assert_eq!((image.width(), image.height()), (500, 200));

        let small = fit_within(DynamicImage::new_rgb8(300, 200), 500);
        assert_eq!((small.width(), small.height()), (300, 200));
    }
}
