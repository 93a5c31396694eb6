//! CLI binary for pdf2md-hybrid.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use pdf2md_hybrid::{
    convert, detect_capabilities, export_markdown, inspect, ConversionConfig, ConversionMode,
    ConversionOutput, ConversionProgressCallback, ConversionReport, DocumentProfile,
    ExtractionMethod, Mode, OutputFormat, PageStatus, PerformanceProfile, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per page. Pages
/// may finish out of order when `--concurrency` is above 1.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` reports the page count.
    fn new_dynamic(file: &str) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Analyzing");
        bar.set_message(file.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn take_elapsed(&self, page_num: usize) -> String {
        let ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize, mode: ConversionMode) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{total_pages} pages in {mode} mode"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(
        &self,
        page_num: usize,
        total: usize,
        method: ExtractionMethod,
        text_chars: usize,
        images: usize,
    ) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<14}  {}  {}",
            green("✓"),
            page_num,
            total,
            method,
            dim(&format!("{text_chars:>6} chars, {images} img")),
            self.take_elapsed(page_num),
        ));
        self.bar.inc(1);
    }

    fn on_page_skipped(&self, page_num: usize, total: usize, reason: PageStatus) {
        let why = match reason {
            PageStatus::SkippedByBudget => "time budget exhausted",
            PageStatus::SkippedBySampling => "not sampled",
            PageStatus::Processed => "no content",
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            yellow("–"),
            page_num,
            total,
            dim(why),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            self.take_elapsed(page_num),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, report: &ConversionReport) {
        self.bar.finish_and_clear();
        let mark = if !report.success() {
            red("✘")
        } else if report.pages_failed > 0 || report.pages_skipped_due_to_budget > 0 {
            yellow("⚠")
        } else {
            green("✔")
        };
        eprintln!("{} {}", mark, report.message());
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Let the analyzer pick the mode
  pdf2md-hybrid report.pdf

  # Force OCR for a scanned document, Indonesian + English
  pdf2md-hybrid --mode ocr --ocr-lang ind+eng scan.pdf

  # Several files, two minutes each, into ./converted
  pdf2md-hybrid -o converted --time-budget 120 a.pdf b.pdf c.pdf

  # Thorough profile: more pages sampled, higher DPI
  pdf2md-hybrid --profile thorough thesis.pdf

  # Export to Word via pandoc
  pdf2md-hybrid --format docx --pandoc-args "--toc" paper.pdf

  # What would happen? (classification only, nothing written)
  pdf2md-hybrid --inspect-only paper.pdf

  # Which backends were found on this machine?
  pdf2md-hybrid --check

MODES:
  auto     Pick HYBRID when most pages carry a text layer, OCR otherwise (default)
  hybrid   Text layer + embedded images; rasterize pages that have neither
  ocr      Everything becomes text; OCR where the text layer is poor

OUTPUT:
  <output-dir>/<stem>_<mode>.md
  <output-dir>/<stem>_<mode>_images/page_<n>_img_<k>.png   (embedded images)
  <output-dir>/<stem>_<mode>_images/page_<n>_full.png      (rasterized pages)

EXTERNAL TOOLS:
  libpdfium    text, images and rendering   (PDFIUM_LIB_PATH or --pdfium-lib)
  pdftoppm     rendering fallback           (poppler-utils)
  tesseract    OCR                          (tesseract-ocr + language packs)
  pandoc       --format other than md

ENVIRONMENT VARIABLES:
  PDF2MD_HYBRID_*   Every option above, e.g. PDF2MD_HYBRID_TIME_BUDGET=60
  PDFIUM_LIB_PATH   Path to an existing libpdfium
  RUST_LOG          Overrides the log filter (e.g. pdf2md_hybrid=debug)
"#;

/// Convert PDF files to Markdown, choosing between text extraction and OCR.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2md-hybrid",
    version,
    about = "Convert PDF files to Markdown, choosing between text extraction and OCR",
    long_about = "Convert PDF documents to Markdown. Each document is profiled first; \
born-digital files keep their text layer and images, scanned files go through OCR. \
A wall-clock budget and page sampling keep large documents bounded.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files to convert.
    #[arg(required_unless_present = "check")]
    inputs: Vec<PathBuf>,

    /// Conversion mode.
    #[arg(long, env = "PDF2MD_HYBRID_MODE", value_enum, default_value = "auto")]
    mode: ModeArg,

    /// Threshold preset: fast or thorough.
    #[arg(long, env = "PDF2MD_HYBRID_PROFILE", value_enum, default_value = "fast")]
    profile: ProfileArg,

    /// Directory for the Markdown file and its image directory.
    #[arg(short, long, env = "PDF2MD_HYBRID_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Wall-clock budget per document in seconds.
    #[arg(long, env = "PDF2MD_HYBRID_TIME_BUDGET", default_value_t = 300)]
    time_budget: u64,

    /// DPI for rasterized pages kept as images (72–400).
    #[arg(long, env = "PDF2MD_HYBRID_DPI",
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: Option<u32>,

    /// DPI for pages rendered for OCR (72–600).
    #[arg(long, env = "PDF2MD_HYBRID_OCR_DPI",
          value_parser = clap::value_parser!(u32).range(72..=600))]
    ocr_dpi: Option<u32>,

    /// Maximum pages eligible for rasterization/OCR in a large document.
    #[arg(long, env = "PDF2MD_HYBRID_SAMPLE_CAP")]
    sample_cap: Option<usize>,

    /// Embedded images smaller than this (pixels per side) are dropped.
    #[arg(long, env = "PDF2MD_HYBRID_MIN_IMAGE_SIZE", default_value_t = 50)]
    min_image_size: u32,

    /// Pages processed concurrently.
    #[arg(short, long, env = "PDF2MD_HYBRID_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Tesseract language(s), e.g. eng or ind+eng.
    #[arg(long, env = "PDF2MD_HYBRID_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Reject inputs larger than this many MB.
    #[arg(long, env = "PDF2MD_HYBRID_MAX_FILE_SIZE", default_value_t = 100)]
    max_file_size: u64,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDF2MD_HYBRID_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2MD_HYBRID_PASSWORD")]
    password: Option<String>,

    /// Final format: md, html, docx, txt, rtf, odt, epub, latex, json.
    #[arg(long, env = "PDF2MD_HYBRID_FORMAT", default_value = "md")]
    format: String,

    /// Extra arguments passed to pandoc (whitespace separated).
    #[arg(long, env = "PDF2MD_HYBRID_PANDOC_ARGS", allow_hyphen_values = true)]
    pandoc_args: Option<String>,

    /// Print structured JSON instead of the human summary.
    #[arg(long, env = "PDF2MD_HYBRID_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2MD_HYBRID_NO_PROGRESS")]
    no_progress: bool,

    /// Classify pages and print the document profile; no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Print which backends were detected, then exit.
    #[arg(long)]
    check: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2MD_HYBRID_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2MD_HYBRID_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Auto,
    Hybrid,
    Ocr,
}

impl From<ModeArg> for Mode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Auto => Mode::Auto,
            ModeArg::Hybrid => Mode::Hybrid,
            ModeArg::Ocr => Mode::Ocr,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ProfileArg {
    Fast,
    Thorough,
}

impl From<ProfileArg> for PerformanceProfile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Fast => PerformanceProfile::fast(),
            ProfileArg::Thorough => PerformanceProfile::thorough(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the per-page feedback; keep library INFO logs
    // out of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let format: OutputFormat = cli.format.parse().context("Invalid --format")?;
    let config = build_config(&cli).context("Invalid configuration")?;

    // ── Capability check ─────────────────────────────────────────────────
    if cli.check {
        let caps = detect_capabilities(&config).await?;
        if cli.json {
            let summary: HashMap<_, _> = caps.summary().into_iter().collect();
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            for (slot, backend) in caps.summary() {
                match backend {
                    Some(name) => println!("{} {:<22} {}", green("✓"), slot, name),
                    None => println!("{} {:<22} {}", red("✗"), slot, dim("not found")),
                }
            }
            for mode in [ConversionMode::Hybrid, ConversionMode::Ocr] {
                match caps.ensure_supports(mode) {
                    Ok(()) => println!("{} {} mode available", green("✓"), mode),
                    Err(e) => println!("{} {}", red("✗"), e),
                }
            }
            let pandoc = pdf2md_hybrid::export::pandoc_available();
            println!(
                "{} {:<22} {}",
                if pandoc { green("✓") } else { dim("·") },
                "pandoc",
                if pandoc { "found" } else { "not found (Markdown only)" }
            );
        }
        if cli.inputs.is_empty() {
            return Ok(ExitCode::SUCCESS);
        }
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let mut failed = 0;
        let mut profiles = Vec::new();
        for input in &cli.inputs {
            match inspect(input, &config).await {
                Ok(profile) if cli.json => profiles.push(profile),
                Ok(profile) => print_profile(input, &profile),
                Err(e) => {
                    failed += 1;
                    eprintln!("{} {}: {}", red("✘"), input.display(), e);
                }
            }
        }
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&profiles)?);
        }
        return Ok(exit_code(failed));
    }

    // ── Run conversions ──────────────────────────────────────────────────
    let mut failed = 0;
    let mut outputs: Vec<ConversionOutput> = Vec::new();
    for input in &cli.inputs {
        let mut config = config.clone();
        if show_progress {
            let cb = CliProgressCallback::new_dynamic(&input.display().to_string());
            config.progress_callback = Some(cb as ProgressCallback);
        }

        let output = match convert(input, &config).await {
            Ok(output) => output,
            Err(e) => {
                failed += 1;
                eprintln!("{} {}: {}", red("✘"), input.display(), e);
                continue;
            }
        };

        let exported = match export_markdown(
            &output.markdown_path,
            format,
            cli.pandoc_args.as_deref(),
        )
        .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                failed += 1;
                eprintln!("{} {}: {}", red("✘"), input.display(), e);
                None
            }
        };

        if !cli.quiet && !cli.json {
            print_summary(&output, exported.as_deref(), show_progress);
        }
        if cli.json {
            outputs.push(output);
        }
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outputs).context("Failed to serialise output")?
        );
    }

    if !cli.quiet && cli.inputs.len() > 1 {
        let ok = cli.inputs.len().saturating_sub(failed);
        eprintln!(
            "{} {}/{} documents converted",
            if failed == 0 { green("✔") } else { yellow("⚠") },
            ok,
            cli.inputs.len()
        );
    }

    Ok(exit_code(failed))
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .mode(cli.mode.into())
        .profile(cli.profile.into())
        .output_dir(&cli.output_dir)
        .time_budget_secs(cli.time_budget)
        .concurrency(cli.concurrency)
        .min_image_px(cli.min_image_size)
        .max_file_size_mb(cli.max_file_size)
        .ocr_language(&cli.ocr_lang);

    if let Some(dpi) = cli.dpi {
        builder = builder.dpi(dpi);
    }
    if let Some(dpi) = cli.ocr_dpi {
        builder = builder.ocr_dpi(dpi);
    }
    if let Some(cap) = cli.sample_cap {
        builder = builder.sample_cap(cap);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }

    Ok(builder.build()?)
}

fn print_profile(input: &Path, p: &DocumentProfile) {
    println!("File:           {}", input.display());
    println!("Pages:          {}", p.total_pages);
    println!("Size:           {:.1} MB", p.file_size as f64 / (1024.0 * 1024.0));
    println!("Classified:     {}/{}", p.classified_pages, p.total_pages);
    println!(
        "Text / Image:   {} / {}  (mixed {}, empty {}, unreadable {})",
        p.text_pages, p.image_pages, p.mixed_pages, p.empty_pages, p.unreadable_pages
    );
    println!("Text ratio:     {:.0}%", p.text_ratio * 100.0);
    println!("Recommended:    {}", bold(p.recommended_mode.label()));
    println!();
}

fn print_summary(output: &ConversionOutput, exported: Option<&Path>, show_progress: bool) {
    let r = &output.report;
    if !show_progress {
        eprintln!("{}", r.message());
    }
    eprintln!(
        "   {}  {} chars  {} images  {}",
        r.mode_used.label(),
        dim(&r.total_text_chars.to_string()),
        dim(&r.total_images.to_string()),
        dim(&format!("{:.1}s", r.elapsed_ms as f64 / 1000.0)),
    );
    if r.pages_skipped_due_to_budget > 0 {
        eprintln!(
            "   {} {} pages skipped: time budget exhausted",
            yellow("⚠"),
            r.pages_skipped_due_to_budget
        );
    }
    if let Some(sampled) = &r.sampled_pages {
        eprintln!(
            "   {} large document: {} of {} pages sampled",
            cyan("ℹ"),
            sampled.len(),
            r.total_pages
        );
    }
    eprintln!("   →  {}", bold(&output.markdown_path.display().to_string()));
    if let Some(dir) = &output.images_dir {
        eprintln!("   →  {}", dir.display());
    }
    if let Some(path) = exported.filter(|p| *p != output.markdown_path) {
        eprintln!("   →  {}", bold(&path.display().to_string()));
    }
}

fn exit_code(failed: usize) -> ExitCode {
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
