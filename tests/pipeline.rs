//! Whole-pipeline tests against in-memory backends.
//!
//! Every collaborator is faked, so these run anywhere: no pdfium, poppler or
//! tesseract required. The PDF files on disk are only a `%PDF` header that
//! satisfies input validation; page content comes from [`FakeDoc`].

use image::DynamicImage;
use pdf2md_hybrid::{
    convert, inspect, AssetExtractor, CapabilityError, CapabilitySet, ConversionConfig,
    ConversionMode, ConversionProgressCallback, EmbeddedImage, ExtractionMethod, Mode, OcrEngine,
    PageCategory, PageError, PageStatus, Pdf2MdError, Rasterizer, TextLayerReader,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Fakes ────────────────────────────────────────────────────────────────────

const BODY: &str = "The quarterly figures show steady growth across every region we operate in, \
with revenue up eleven percent and operating costs flat compared with last year.";

#[derive(Clone, Default)]
struct FakePage {
    text: String,
    /// `(width, height)` of each embedded image.
    images: Vec<(u32, u32)>,
    unreadable: bool,
}

impl FakePage {
    fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    fn figure(caption: &str, images: &[(u32, u32)]) -> Self {
        Self {
            text: caption.to_string(),
            images: images.to_vec(),
            ..Self::default()
        }
    }

    fn scanned() -> Self {
        Self::default()
    }
}

/// One fake serving the text, asset and raster slots, counting calls.
#[derive(Default)]
struct FakeDoc {
    pages: Vec<FakePage>,
    renders: AtomicUsize,
}

impl FakeDoc {
    fn new(pages: Vec<FakePage>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            renders: AtomicUsize::new(0),
        })
    }

    fn page(&self, index: usize) -> Result<&FakePage, CapabilityError> {
        match self.pages.get(index) {
            Some(p) if !p.unreadable => Ok(p),
            _ => Err(CapabilityError::Open {
                backend: "fake",
                detail: format!("page {} unreadable", index + 1),
            }),
        }
    }
}

impl TextLayerReader for FakeDoc {
    fn name(&self) -> &'static str {
        "fake-text"
    }
    fn page_count(&self, _: &Path) -> Result<usize, CapabilityError> {
        Ok(self.pages.len())
    }
    fn read_page_text(&self, _: &Path, page_index: usize) -> Result<String, CapabilityError> {
        Ok(self.page(page_index)?.text.clone())
    }
}

impl AssetExtractor for FakeDoc {
    fn name(&self) -> &'static str {
        "fake-assets"
    }
    fn count_images(&self, _: &Path, page_index: usize) -> Result<usize, CapabilityError> {
        Ok(self.page(page_index)?.images.len())
    }
    fn extract_images(
        &self,
        _: &Path,
        page_index: usize,
    ) -> Result<Vec<EmbeddedImage>, CapabilityError> {
        Ok(self
            .page(page_index)?
            .images
            .iter()
            .enumerate()
            .map(|(object_index, &(w, h))| EmbeddedImage {
                object_index,
                image: DynamicImage::new_rgb8(w, h),
            })
            .collect())
    }
}

impl Rasterizer for FakeDoc {
    fn name(&self) -> &'static str {
        "fake-raster"
    }
    fn render_page(
        &self,
        _: &Path,
        page_index: usize,
        _: u32,
    ) -> Result<DynamicImage, CapabilityError> {
        self.page(page_index)?;
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(DynamicImage::new_rgb8(32, 32))
    }
}

struct FakeOcr {
    calls: AtomicUsize,
    fail: bool,
}

impl FakeOcr {
    fn working() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }
}

impl OcrEngine for FakeOcr {
    fn name(&self) -> &'static str {
        "fake-ocr"
    }
    fn recognize(&self, _: &DynamicImage) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CapabilityError::Command {
                command: "tesseract".to_string(),
                detail: "exit status 1: Error opening data file eng.traineddata".to_string(),
            });
        }
        Ok("Recognised   text from a\n\n scanned page.  ".to_string())
    }
}

/// A second text layer that always fails, to prove fall-through.
struct CorruptReader;

impl TextLayerReader for CorruptReader {
    fn name(&self) -> &'static str {
        "corrupt"
    }
    fn page_count(&self, _: &Path) -> Result<usize, CapabilityError> {
        Err(CapabilityError::Open {
            backend: "corrupt",
            detail: "invalid xref".to_string(),
        })
    }
    fn read_page_text(&self, _: &Path, _: usize) -> Result<String, CapabilityError> {
        Err(CapabilityError::Backend {
            backend: "corrupt",
            detail: "bad content stream".to_string(),
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn pdf(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"%PDF-1.7\n% fake body\n%%EOF\n").unwrap();
        path
    }

    fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }
}

fn full_caps(doc: &Arc<FakeDoc>, ocr: Arc<FakeOcr>) -> CapabilitySet {
    CapabilitySet::empty()
        .with_text_layer(doc.clone())
        .with_assets(doc.clone())
        .with_rasterizer(doc.clone())
        .with_ocr(ocr)
}

fn config(ws: &Workspace, caps: CapabilitySet) -> pdf2md_hybrid::ConversionConfigBuilder {
    ConversionConfig::builder()
        .output_dir(ws.out())
        .capabilities(caps)
}

/// `![alt](ref)` targets in document order, `<...>` destinations unwrapped.
fn image_refs(markdown: &str) -> Vec<String> {
    markdown
        .lines()
        .filter_map(|l| l.strip_prefix("![")?.split_once("](")?.1.strip_suffix(')'))
        .map(|target| {
            target
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .unwrap_or(target)
                .to_string()
        })
        .collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mixed_document_in_auto_mode() {
    let ws = Workspace::new();
    let pdf = ws.pdf("report.pdf");
    let doc = FakeDoc::new(vec![
        FakePage::text(BODY),
        FakePage::figure("Figure 1", &[(120, 80), (10, 10), (200, 150)]),
        FakePage::scanned(),
    ]);
    let ocr = FakeOcr::working();
    let config = config(&ws, full_caps(&doc, ocr.clone())).build().unwrap();

    let output = convert(&pdf, &config).await.unwrap();

    // One text page of three: the ratio sits in the middle band, which keeps HYBRID.
    assert_eq!(output.profile.recommended_mode, ConversionMode::Hybrid);
    assert_eq!(output.report.mode_used, ConversionMode::Hybrid);
    assert_eq!(output.profile.text_pages, 1);
    assert_eq!(output.profile.image_pages, 1);
    assert_eq!(output.profile.empty_pages, 1);

    let p = &output.pages;
    assert_eq!(p.len(), 3);
    assert_eq!(p[0].method_used, ExtractionMethod::NativeText);
    assert_eq!(p[0].text.as_deref(), Some(BODY));
    assert_eq!(
        p[1].image_paths,
        vec![
            "report_hybrid_images/page_2_img_1.png".to_string(),
            "report_hybrid_images/page_2_img_3.png".to_string(),
        ]
    );
    assert_eq!(p[2].method_used, ExtractionMethod::Rasterize);
    assert_eq!(p[2].image_paths, vec!["report_hybrid_images/page_3_full.png".to_string()]);

    // HYBRID never calls OCR.
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);

    assert_eq!(output.markdown_path, ws.out().join("report_hybrid.md"));
    let on_disk = std::fs::read_to_string(&output.markdown_path).unwrap();
    assert_eq!(on_disk, output.markdown);
    assert!(on_disk.starts_with("# report\n"));
    assert!(on_disk.contains("**Mode:** HYBRID (auto)"));
    assert!(on_disk.contains("![Page 3](report_hybrid_images/page_3_full.png)"));
    // The caption is below the render threshold.
    assert!(!on_disk.contains("Figure 1\n"));

    assert!(output.report.success());
    assert_eq!(output.report.total_images, 3);
    assert_eq!(output.report.pages_processed, 3);
    assert_eq!(output.images_dir, Some(ws.out().join("report_hybrid_images")));
}

#[tokio::test]
async fn every_page_gets_exactly_one_section() {
    let ws = Workspace::new();
    let pdf = ws.pdf("pages.pdf");
    let mut pages: Vec<FakePage> = (0..9).map(|_| FakePage::text(BODY)).collect();
    pages[4] = FakePage {
        unreadable: true,
        ..FakePage::default()
    };
    pages[7] = FakePage::scanned();
    let doc = FakeDoc::new(pages);
    let config = config(&ws, full_caps(&doc, FakeOcr::working()))
        .mode(Mode::Hybrid)
        .concurrency(4)
        .build()
        .unwrap();

    let output = convert(&pdf, &config).await.unwrap();

    let indices: Vec<usize> = output.pages.iter().map(|p| p.page_index).collect();
    assert_eq!(indices, (0..9).collect::<Vec<_>>());
    for n in 1..=9 {
        assert_eq!(
            output.markdown.matches(&format!("## Page {n}\n")).count(),
            1,
            "page {n}"
        );
    }
    let positions: Vec<usize> = (1..=9)
        .map(|n| output.markdown.find(&format!("## Page {n}\n")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    // The unreadable page failed on its own; the rest of the run went on.
    assert_eq!(output.profile.unreadable_pages, 1);
    assert!(output.pages[4].error.is_some());
    assert!(output.markdown.contains("*[Extraction failed for page 5:"));
    assert_eq!(output.report.pages_failed, 1);
    assert!(output.report.success());
}

#[tokio::test]
async fn every_image_reference_resolves() {
    let ws = Workspace::new();
    let pdf = ws.pdf("figures.pdf");
    let doc = FakeDoc::new(vec![
        FakePage::figure(BODY, &[(300, 200)]),
        FakePage::scanned(),
        FakePage::figure("", &[(64, 64), (64, 64)]),
    ]);
    let config = config(&ws, full_caps(&doc, FakeOcr::working()))
        .mode(Mode::Hybrid)
        .build()
        .unwrap();

    let output = convert(&pdf, &config).await.unwrap();

    let refs = image_refs(&output.markdown);
    assert_eq!(refs.len(), 4);
    let md_dir = output.markdown_path.parent().unwrap();
    for r in &refs {
        assert!(md_dir.join(r).is_file(), "dangling reference {r}");
    }
    let saved = std::fs::read_dir(output.images_dir.as_ref().unwrap())
        .unwrap()
        .count();
    assert_eq!(saved, refs.len(), "no orphaned files");
}

#[tokio::test]
async fn spaced_file_names_keep_image_links_parseable() {
    let ws = Workspace::new();
    let pdf = ws.pdf("My Report (1).pdf");
    let doc = FakeDoc::new(vec![
        FakePage::text(BODY),
        FakePage::figure("Figure 1", &[(300, 200)]),
    ]);
    let config = config(&ws, full_caps(&doc, FakeOcr::working()))
        .mode(Mode::Hybrid)
        .build()
        .unwrap();

    let output = convert(&pdf, &config).await.unwrap();

    assert_eq!(output.markdown_path, ws.out().join("My Report (1)_hybrid.md"));
    assert_eq!(
        output.pages[1].image_paths,
        vec!["My Report (1)_hybrid_images/page_2_img_1.png".to_string()]
    );
    assert!(output
        .markdown
        .contains("![Image 1](<My Report (1)_hybrid_images/page_2_img_1.png>)\n"));

    let refs = image_refs(&output.markdown);
    assert_eq!(refs.len(), 1);
    let md_dir = output.markdown_path.parent().unwrap();
    assert!(md_dir.join(&refs[0]).is_file(), "dangling reference {}", refs[0]);
}

#[tokio::test]
async fn ocr_mode_prefers_text_layer_then_recognises() {
    let ws = Workspace::new();
    let pdf = ws.pdf("scan.pdf");
    let doc = FakeDoc::new(vec![FakePage::text(BODY), FakePage::scanned()]);
    let ocr = FakeOcr::working();
    let caps = full_caps(&doc, ocr.clone()).with_alternate_text_layer(Arc::new(CorruptReader));
    let config = config(&ws, caps).mode(Mode::Ocr).build().unwrap();

    let output = convert(&pdf, &config).await.unwrap();

    assert_eq!(output.report.mode_used, ConversionMode::Ocr);
    assert_eq!(output.pages[0].method_used, ExtractionMethod::NativeText);
    assert_eq!(output.pages[1].method_used, ExtractionMethod::Ocr);
    assert_eq!(
        output.pages[1].text.as_deref(),
        Some("Recognised text from a\nscanned page.")
    );
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
    assert!(output.images_dir.is_none(), "OCR runs keep no images");
    assert!(!ws.out().join("scan_ocr_images").exists());
    assert_eq!(output.markdown_path, ws.out().join("scan_ocr.md"));
}

#[tokio::test]
async fn zero_budget_yields_placeholders_for_every_page() {
    let ws = Workspace::new();
    let pdf = ws.pdf("late.pdf");
    let doc = FakeDoc::new((0..4).map(|_| FakePage::text(BODY)).collect());
    let config = config(&ws, full_caps(&doc, FakeOcr::working()))
        .time_budget_secs(0)
        .build()
        .unwrap();

    let output = convert(&pdf, &config).await.unwrap();

    assert_eq!(output.profile.classified_pages, 0);
    assert_eq!(output.report.pages_skipped_due_to_budget, 4);
    assert_eq!(output.report.pages_processed, 0);
    assert!(output
        .pages
        .iter()
        .all(|p| p.status == PageStatus::SkippedByBudget));
    assert_eq!(
        output
            .markdown
            .matches("*[Page skipped: time budget exhausted]*")
            .count(),
        4
    );
    assert!(output.markdown.contains("## Conversion Summary"));
    assert_eq!(doc.renders.load(Ordering::SeqCst), 0);
    assert!(output.report.success());
}

#[tokio::test]
async fn large_scanned_document_is_sampled() {
    let ws = Workspace::new();
    let pdf = ws.pdf("archive.pdf");
    let doc = FakeDoc::new((0..40).map(|_| FakePage::scanned()).collect());
    let ocr = FakeOcr::working();
    let config = config(&ws, full_caps(&doc, ocr.clone())).build().unwrap();

    let output = convert(&pdf, &config).await.unwrap();

    assert_eq!(output.report.mode_used, ConversionMode::Ocr);
    let sampled = output.report.sampled_pages.clone().unwrap();
    // 20 from head + needs-visual, then the 3 tail pages.
    assert_eq!(sampled.len(), 23);
    assert_eq!(&sampled[..5], &[1, 2, 3, 4, 5]);
    assert_eq!(&sampled[20..], &[38, 39, 40]);

    assert_eq!(ocr.calls.load(Ordering::SeqCst), 23);
    assert_eq!(output.report.pages_skipped_due_to_sampling, 17);
    assert_eq!(output.pages[24].status, PageStatus::SkippedBySampling);
    assert!(output
        .markdown
        .contains("*[Page appears to be image-based - not sampled]*"));
    assert!(output.markdown.contains("limited to 23 of 40 pages: 1-20, 38-40"));
}

#[tokio::test]
async fn thorough_profile_never_samples() {
    let ws = Workspace::new();
    let pdf = ws.pdf("archive.pdf");
    let doc = FakeDoc::new((0..25).map(|_| FakePage::scanned()).collect());
    let ocr = FakeOcr::working();
    let config = config(&ws, full_caps(&doc, ocr.clone()))
        .profile(pdf2md_hybrid::PerformanceProfile::thorough())
        .build()
        .unwrap();

    let output = convert(&pdf, &config).await.unwrap();

    assert!(output.report.sampled_pages.is_none());
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 25);
}

#[tokio::test]
async fn failing_ocr_is_recorded_per_page() {
    let ws = Workspace::new();
    let pdf = ws.pdf("scan.pdf");
    let doc = FakeDoc::new(vec![FakePage::scanned(), FakePage::text(BODY)]);
    let config = config(&ws, full_caps(&doc, FakeOcr::broken()))
        .mode(Mode::Ocr)
        .build()
        .unwrap();

    let output = convert(&pdf, &config).await.unwrap();

    let failed = &output.pages[0];
    assert!(failed.text.is_none() && failed.image_paths.is_empty());
    assert!(matches!(
        failed.error,
        Some(PageError::ExtractionFailure { page: 1, .. })
    ));
    assert!(output.markdown.contains("*[Extraction failed for page 1:"));
    assert_eq!(output.pages[1].method_used, ExtractionMethod::NativeText);
    assert!(output.report.success());
}

#[tokio::test]
async fn missing_ocr_engine_fails_before_any_page() {
    let ws = Workspace::new();
    let pdf = ws.pdf("scan.pdf");
    let doc = FakeDoc::new(vec![FakePage::scanned(); 3]);
    let caps = CapabilitySet::empty()
        .with_text_layer(doc.clone())
        .with_rasterizer(doc.clone());
    let config = config(&ws, caps).mode(Mode::Ocr).build().unwrap();

    let err = convert(&pdf, &config).await.unwrap_err();

    assert!(matches!(err, Pdf2MdError::CapabilityUnavailable { .. }));
    assert_eq!(doc.renders.load(Ordering::SeqCst), 0);
    assert!(!ws.out().join("scan_ocr.md").exists());
}

#[tokio::test]
async fn hybrid_without_rasterizer_still_converts_text() {
    let ws = Workspace::new();
    let pdf = ws.pdf("plain.pdf");
    let doc = FakeDoc::new(vec![FakePage::text(BODY), FakePage::scanned()]);
    let caps = CapabilitySet::empty().with_text_layer(doc.clone());
    let config = config(&ws, caps).mode(Mode::Hybrid).build().unwrap();

    let output = convert(&pdf, &config).await.unwrap();

    assert_eq!(output.pages[0].method_used, ExtractionMethod::NativeText);
    assert_eq!(output.pages[1].method_used, ExtractionMethod::None);
    assert!(output.pages[1].error.is_none());
    assert!(output
        .markdown
        .contains("*[No readable content found on this page]*"));
    assert!(output.images_dir.is_none());
}

#[tokio::test]
async fn rerun_replaces_previous_output() {
    let ws = Workspace::new();
    let pdf = ws.pdf("again.pdf");
    let doc = FakeDoc::new(vec![FakePage::scanned()]);
    let config = config(&ws, full_caps(&doc, FakeOcr::working()))
        .mode(Mode::Hybrid)
        .build()
        .unwrap();

    convert(&pdf, &config).await.unwrap();
    let stale = ws.out().join("again_hybrid_images").join("stale.png");
    std::fs::write(&stale, b"old").unwrap();
    let output = convert(&pdf, &config).await.unwrap();

    assert!(!stale.exists());
    assert_eq!(image_refs(&output.markdown), vec!["again_hybrid_images/page_1_full.png"]);
}

#[tokio::test]
async fn not_a_pdf_is_rejected() {
    let ws = Workspace::new();
    let fake = ws.dir.path().join("notes.pdf");
    std::fs::write(&fake, b"hello").unwrap();
    let config = config(&ws, CapabilitySet::empty()).build().unwrap();

    let err = convert(&fake, &config).await.unwrap_err();
    assert!(matches!(err, Pdf2MdError::NotAPdf { .. }));
}

#[tokio::test]
async fn unopenable_document_is_corrupt() {
    let ws = Workspace::new();
    let pdf = ws.pdf("broken.pdf");
    let caps = CapabilitySet::empty().with_text_layer(Arc::new(CorruptReader));
    let config = config(&ws, caps).build().unwrap();

    let err = convert(&pdf, &config).await.unwrap_err();
    assert!(matches!(err, Pdf2MdError::CorruptPdf { .. }));
}

#[tokio::test]
async fn inspect_classifies_without_writing() {
    let ws = Workspace::new();
    let pdf = ws.pdf("peek.pdf");
    let doc = FakeDoc::new(vec![
        FakePage::text(BODY),
        FakePage::figure(BODY, &[(100, 100)]),
        FakePage::scanned(),
    ]);
    let config = config(&ws, full_caps(&doc, FakeOcr::working())).build().unwrap();

    let profile = inspect(&pdf, &config).await.unwrap();

    let categories: Vec<PageCategory> = profile
        .classifications
        .iter()
        .map(|c| c.category)
        .collect();
    assert_eq!(
        categories,
        vec![PageCategory::Text, PageCategory::Mixed, PageCategory::Empty]
    );
    assert_eq!(profile.recommended_mode, ConversionMode::Hybrid);
    assert!(!ws.out().exists());
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ConversionProgressCallback for Recorder {
    fn on_conversion_start(&self, total_pages: usize, mode: ConversionMode) {
        self.events.lock().unwrap().push(format!("start {total_pages} {mode}"));
    }
    fn on_page_complete(
        &self,
        page: usize,
        _: usize,
        method: ExtractionMethod,
        _: usize,
        _: usize,
    ) {
        self.events.lock().unwrap().push(format!("done {page} {method}"));
    }
    fn on_page_skipped(&self, page: usize, _: usize, reason: PageStatus) {
        self.events.lock().unwrap().push(format!("skip {page} {reason:?}"));
    }
    fn on_conversion_complete(&self, report: &pdf2md_hybrid::ConversionReport) {
        self.events
            .lock()
            .unwrap()
            .push(format!("complete {}", report.pages_processed));
    }
}

#[tokio::test]
async fn progress_events_follow_the_run() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pdf2md_hybrid=debug")
        .with_test_writer()
        .try_init();

    let ws = Workspace::new();
    let pdf = ws.pdf("events.pdf");
    let doc = FakeDoc::new(vec![FakePage::text(BODY), FakePage::scanned()]);
    let recorder = Arc::new(Recorder::default());
    let config = config(&ws, full_caps(&doc, FakeOcr::working()))
        .mode(Mode::Hybrid)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    convert(&pdf, &config).await.unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "start 2 HYBRID",
            "done 1 native text",
            "done 2 rasterize",
            "complete 2",
        ]
    );
}
