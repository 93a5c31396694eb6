//! Library entry points.
//!
//! [`convert`] is the primary API: validate the input, detect capabilities
//! (unless the config carries a set), open the document, run the
//! orchestrator, then write the Markdown atomically next to its image
//! directory. [`inspect`] stops after analysis and writes nothing.

use crate::capability::CapabilitySet;
use crate::config::ConversionConfig;
use crate::error::Pdf2MdError;
use crate::output::ConversionOutput;
use crate::pipeline::analyze::{analyze, DocumentProfile};
use crate::pipeline::budget::TimeBudget;
use crate::pipeline::document::Document;
use crate::pipeline::input;
use crate::pipeline::orchestrator::ConversionOrchestrator;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Convert a PDF file to Markdown.
///
/// Writes `<output_dir>/<stem>_<mode>.md` and, when any image was saved,
/// `<output_dir>/<stem>_<mode>_images/`.
///
/// # Returns
/// `Ok(ConversionOutput)` whenever a document was produced, even if some
/// pages failed or were skipped (check `output.report`).
///
/// # Errors
/// Returns `Err(Pdf2MdError)` only for fatal errors:
/// - File not found, unreadable, not a PDF or too large
/// - No reader can open the document
/// - The selected mode's capability is missing
/// - The output cannot be written
pub async fn convert(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    let budget = TimeBudget::from_secs(config.time_budget_secs);
    let input_path = input_path.as_ref();
    info!("Starting conversion: {}", input_path.display());

    // ── Step 1: Validate input ───────────────────────────────────────────
    let validated = input::validate_pdf(input_path, config.max_file_size_mb)?;

    // ── Step 2: Resolve capabilities ─────────────────────────────────────
    let caps = resolve_capabilities(config).await?;

    // ── Step 3: Open document ────────────────────────────────────────────
    let document = open_document(validated.path.clone(), validated.size_bytes, caps.clone()).await?;

    // ── Step 4: Run the pipeline ─────────────────────────────────────────
    let mut orchestrator = ConversionOrchestrator::new(caps, config.clone());
    let run = orchestrator.run(&document, budget).await?;

    // ── Step 5: Write output ─────────────────────────────────────────────
    let markdown_path = config.output_dir.join(format!("{}.md", run.output_stem));
    write_atomic(&markdown_path, &run.markdown).await?;
    let images_dir = run.assets.finish().then(|| run.assets.dir().to_path_buf());

    info!(
        "Conversion complete: {} ({} pages, {}ms)",
        markdown_path.display(),
        run.report.total_pages,
        run.report.elapsed_ms
    );

    Ok(ConversionOutput {
        markdown: run.markdown,
        pages: run.pages,
        profile: run.profile,
        report: run.report,
        markdown_path,
        images_dir,
    })
}

/// Convert several PDFs one after another with the same configuration.
///
/// Each input gets its own result; one failure does not stop the batch. The
/// time budget applies per document.
pub async fn convert_batch<P: AsRef<Path>>(
    inputs: &[P],
    config: &ConversionConfig,
) -> Vec<(PathBuf, Result<ConversionOutput, Pdf2MdError>)> {
    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        let path = input.as_ref().to_path_buf();
        let result = convert(&path, config).await;
        if let Err(e) = &result {
            warn!("{}: {}", path.display(), e);
        }
        results.push((path, result));
    }
    results
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_path, config))
}

/// Classify every page and recommend a mode without converting anything.
pub async fn inspect(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<DocumentProfile, Pdf2MdError> {
    let budget = TimeBudget::from_secs(config.time_budget_secs);
    let validated = input::validate_pdf(input_path.as_ref(), config.max_file_size_mb)?;
    let caps = resolve_capabilities(config).await?;
    let document = open_document(validated.path, validated.size_bytes, caps.clone()).await?;
    let profile = config.profile.clone();
    tokio::task::spawn_blocking(move || analyze(&caps, &document, &profile, &budget))
        .await
        .map_err(|e| Pdf2MdError::Internal(format!("analysis task panicked: {e}")))
}

/// Probe the host for collaborators. Blocking work runs off the runtime.
pub async fn detect_capabilities(config: &ConversionConfig) -> Result<CapabilitySet, Pdf2MdError> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || CapabilitySet::detect(&config))
        .await
        .map_err(|e| Pdf2MdError::Internal(format!("capability detection panicked: {e}")))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn resolve_capabilities(config: &ConversionConfig) -> Result<CapabilitySet, Pdf2MdError> {
    match &config.capabilities {
        Some(caps) => {
            debug!("Using injected capabilities: {:?}", caps);
            Ok(caps.clone())
        }
        None => detect_capabilities(config).await,
    }
}

async fn open_document(
    path: PathBuf,
    size_bytes: u64,
    caps: CapabilitySet,
) -> Result<Document, Pdf2MdError> {
    tokio::task::spawn_blocking(move || Document::open(&path, size_bytes, &caps))
        .await
        .map_err(|e| Pdf2MdError::Internal(format!("document open panicked: {e}")))?
}

/// Atomic write: write to temp, then rename.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), Pdf2MdError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Pdf2MdError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| Pdf2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Pdf2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
