//! The conversion state machine.
//!
//! ```text
//! Analyzing ──▶ ModeSelected ──▶ ProcessingPages ──▶ Assembling ──▶ Done
//! ```
//!
//! A run is single-pass: no state is entered twice. Budget exhaustion does
//! not add a transition; pages not yet started get a skipped result and the
//! run moves on to assembly as usual.
//!
//! The only terminal failure is a selected mode whose required capability is
//! missing, detected once in `ModeSelected` before any page work.

use super::analyze::{analyze, DocumentProfile};
use super::assemble::{assemble, DocumentMetadata};
use super::assets::AssetStore;
use super::budget::TimeBudget;
use super::chain::{ExtractionChain, PageContext, Withheld};
use super::document::Document;
use super::sample::{select_sample, SamplePolicy};
use crate::capability::CapabilitySet;
use crate::config::{ConversionConfig, ConversionMode, Mode};
use crate::error::{PageError, Pdf2MdError};
use crate::output::{ConversionReport, ExtractionResult, PageStatus};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    Analyzing,
    ModeSelected,
    ProcessingPages,
    Assembling,
    Done,
}

impl ConversionState {
    /// The only state reachable from `self`.
    pub fn successor(self) -> Option<Self> {
        match self {
            ConversionState::Analyzing => Some(ConversionState::ModeSelected),
            ConversionState::ModeSelected => Some(ConversionState::ProcessingPages),
            ConversionState::ProcessingPages => Some(ConversionState::Assembling),
            ConversionState::Assembling => Some(ConversionState::Done),
            ConversionState::Done => None,
        }
    }
}

impl fmt::Display for ConversionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConversionState::Analyzing => "analyzing",
            ConversionState::ModeSelected => "mode selected",
            ConversionState::ProcessingPages => "processing pages",
            ConversionState::Assembling => "assembling",
            ConversionState::Done => "done",
        };
        f.write_str(s)
    }
}

/// Everything a run produced, before anything is written to disk.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub markdown: String,
    pub pages: Vec<ExtractionResult>,
    pub profile: DocumentProfile,
    pub report: ConversionReport,
    pub mode: ConversionMode,
    /// `<stem>_<mode>`, the base name of the Markdown file.
    pub output_stem: String,
    pub assets: AssetStore,
    /// The budget ran out before every page was started.
    pub budget_exhausted: bool,
}

/// Drives one document through the pipeline.
pub struct ConversionOrchestrator {
    caps: CapabilitySet,
    config: ConversionConfig,
    state: ConversionState,
}

impl ConversionOrchestrator {
    pub fn new(caps: CapabilitySet, config: ConversionConfig) -> Self {
        Self {
            caps,
            config,
            state: ConversionState::Analyzing,
        }
    }

    pub fn state(&self) -> ConversionState {
        self.state
    }

    fn advance(&mut self, to: ConversionState) -> Result<(), Pdf2MdError> {
        if self.state.successor() != Some(to) {
            return Err(Pdf2MdError::Internal(format!(
                "invalid state transition: {} → {}",
                self.state, to
            )));
        }
        debug!("State: {} → {}", self.state, to);
        self.state = to;
        Ok(())
    }

    /// Run the whole state machine over `document`.
    ///
    /// `budget` should have been started when the caller began the run, so
    /// that validation and detection count against it too.
    pub async fn run(
        &mut self,
        document: &Document,
        budget: TimeBudget,
    ) -> Result<RunOutput, Pdf2MdError> {
        if self.state != ConversionState::Analyzing {
            return Err(Pdf2MdError::Internal(
                "orchestrator runs are single-pass".to_string(),
            ));
        }
        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let config = &self.config;
        let total_pages = document.total_pages;

        // ── Step 1: Analyze ──────────────────────────────────────────────
        let doc_profile = {
            let caps = self.caps.clone();
            let doc = document.clone();
            let profile = config.profile.clone();
            tokio::task::spawn_blocking(move || analyze(&caps, &doc, &profile, &budget))
                .await
                .map_err(|e| Pdf2MdError::Internal(format!("analysis task panicked: {e}")))?
        };
        self.advance(ConversionState::ModeSelected)?;

        // ── Step 2: Select mode ──────────────────────────────────────────
        let config = &self.config;
        let mode = config.mode.resolve(doc_profile.recommended_mode);
        if config.mode != Mode::Auto && mode != doc_profile.recommended_mode {
            info!(
                "Mode {} requested; analysis recommended {}",
                mode, doc_profile.recommended_mode
            );
        }
        self.caps.ensure_supports(mode)?;
        info!("Converting {} in {} mode", document.name, mode);
        self.advance(ConversionState::ProcessingPages)?;

        // ── Step 3: Process pages ────────────────────────────────────────
        let config = &self.config;
        let output_stem = format!("{}_{}", document.stem, mode.as_str());
        let assets = AssetStore::new(&config.output_dir, format!("{output_stem}_images"));
        assets.prepare()?;

        let sample = sample_for(mode, config, document, &doc_profile);
        if let Some(sample) = &sample {
            info!(
                "Large document: expensive work limited to {} of {} pages",
                sample.len(),
                total_pages
            );
        }

        let mut report = ConversionReport::new(
            document.name.clone(),
            config.mode,
            mode,
            config.profile.name.clone(),
            total_pages,
        );
        report.sampled_pages = sample
            .as_ref()
            .map(|s| s.iter().map(|i| i + 1).collect());

        if let Some(cb) = &config.progress_callback {
            cb.on_conversion_start(total_pages, mode);
        }

        let job = Arc::new(PageJob {
            caps: self.caps.clone(),
            chain: ExtractionChain::for_mode(mode, &config.profile),
            assets: assets.clone(),
            config: config.clone(),
            document: document.clone(),
            doc_profile: doc_profile.clone(),
            sample,
            mode,
            budget,
        });
        let mut pages = process_pages(job, config.concurrency).await;
        pages.sort_by_key(|p| p.page_index);

        for page in &pages {
            report.record(page);
        }
        let budget_exhausted = report.pages_skipped_due_to_budget > 0;
        if budget_exhausted {
            warn!(
                "Time budget of {}s exhausted: {} pages skipped",
                budget.budget().as_secs(),
                report.pages_skipped_due_to_budget
            );
        }
        self.advance(ConversionState::Assembling)?;

        // ── Step 4: Assemble ─────────────────────────────────────────────
        report.elapsed_ms = budget.elapsed().as_millis() as u64;
        let meta = DocumentMetadata {
            title: document.stem.clone(),
            source_name: document.name.clone(),
            generated_at,
            mode,
            requested_mode: self.config.mode,
            sampled_pages: report.sampled_pages.clone(),
            total_pages,
        };
        let markdown = assemble(&pages, &meta, &report, self.config.min_render_chars);
        self.advance(ConversionState::Done)?;

        if let Some(cb) = &self.config.progress_callback {
            cb.on_conversion_complete(&report);
        }
        info!("{}", report.message());

        Ok(RunOutput {
            markdown,
            pages,
            profile: doc_profile,
            report,
            mode,
            output_stem,
            assets,
            budget_exhausted,
        })
    }
}

/// The sample of pages eligible for expensive work, or `None` when the
/// document is not large for `mode`.
fn sample_for(
    mode: ConversionMode,
    config: &ConversionConfig,
    document: &Document,
    doc_profile: &DocumentProfile,
) -> Option<BTreeSet<usize>> {
    let profile = &config.profile;
    let large = match mode {
        ConversionMode::Hybrid => {
            profile.is_large_for_hybrid(document.total_pages, document.file_size)
        }
        ConversionMode::Ocr => profile.is_large_for_ocr(document.total_pages),
    };
    large.then(|| {
        select_sample(
            document.total_pages,
            &doc_profile.needs_visual(),
            SamplePolicy {
                head: profile.sample_head,
                tail: profile.sample_tail,
                cap: profile.sample_cap,
            },
        )
    })
}

/// Shared, read-only state for page workers.
struct PageJob {
    caps: CapabilitySet,
    chain: ExtractionChain,
    assets: AssetStore,
    config: ConversionConfig,
    document: Document,
    doc_profile: DocumentProfile,
    sample: Option<BTreeSet<usize>>,
    mode: ConversionMode,
    budget: TimeBudget,
}

impl PageJob {
    fn is_sampled(&self, page_index: usize) -> bool {
        self.sample
            .as_ref()
            .is_none_or(|sample| sample.contains(&page_index))
    }

    /// One page through asset extraction and the chain. Blocking.
    fn process(&self, page_index: usize) -> ExtractionResult {
        let started = Instant::now();
        let mut result = ExtractionResult::new(page_index);
        let pdf = self.document.path.as_path();

        let mut embedded = Vec::new();
        if self.mode == ConversionMode::Hybrid {
            if let Some(extractor) = &self.caps.assets {
                let (saved, problems) = self.assets.save_embedded(
                    extractor.as_ref(),
                    pdf,
                    page_index,
                    self.config.min_image_px,
                );
                embedded = saved;
                result.warnings.extend(problems);
            }
        }

        let ctx = PageContext {
            pdf,
            page_index,
            caps: &self.caps,
            assets: &self.assets,
            profile: &self.config.profile,
            budget: &self.budget,
            hint: self.doc_profile.classification(page_index),
            sampled: self.is_sampled(page_index),
            has_embedded_assets: !embedded.is_empty(),
        };
        let outcome = self.chain.run(&ctx);

        result.text = outcome.text;
        result.method_used = outcome.method;
        result.image_paths = embedded;
        result.image_paths.extend(outcome.image_paths);
        result.warnings.extend(outcome.warnings);
        if !result.has_content() {
            result.error = outcome.error;
            result.status = match outcome.withheld {
                Some(Withheld::Sampling) => PageStatus::SkippedBySampling,
                Some(Withheld::Budget) => PageStatus::SkippedByBudget,
                None => PageStatus::Processed,
            };
        }
        result.duration_ms = started.elapsed().as_millis() as u64;
        result
    }
}

/// Process every page, at most `concurrency` at a time.
///
/// The budget is checked as each page is picked up; pages picked up after
/// exhaustion get a skipped result without touching the document.
async fn process_pages(job: Arc<PageJob>, concurrency: usize) -> Vec<ExtractionResult> {
    let total_pages = job.document.total_pages;
    stream::iter((0..total_pages).map(|page_index| {
        let job = Arc::clone(&job);
        async move {
            let page_num = page_index + 1;
            let cb = job.config.progress_callback.clone();

            if job.budget.is_exhausted() {
                if let Some(cb) = &cb {
                    cb.on_page_skipped(page_num, total_pages, PageStatus::SkippedByBudget);
                }
                return ExtractionResult::skipped(page_index, PageStatus::SkippedByBudget);
            }

            if let Some(cb) = &cb {
                cb.on_page_start(page_num, total_pages);
            }
            let worker = Arc::clone(&job);
            let result = match tokio::task::spawn_blocking(move || worker.process(page_index)).await
            {
                Ok(result) => result,
                Err(e) => {
                    warn!("Page {}: worker failed: {}", page_num, e);
                    let mut failed = ExtractionResult::new(page_index);
                    failed.error = Some(PageError::ExtractionFailure {
                        page: page_num,
                        method: "page worker".to_string(),
                        detail: e.to_string(),
                    });
                    failed
                }
            };

            if let Some(cb) = &cb {
                match (&result.status, &result.error) {
                    (PageStatus::Processed, None) => cb.on_page_complete(
                        page_num,
                        total_pages,
                        result.method_used,
                        result.text_chars(),
                        result.image_paths.len(),
                    ),
                    (PageStatus::Processed, Some(e)) => {
                        cb.on_page_error(page_num, total_pages, &e.to_string())
                    }
                    (status, _) => cb.on_page_skipped(page_num, total_pages, *status),
                }
            }
            result
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_advance_linearly() {
        let mut state = ConversionState::Analyzing;
        let mut seen = vec![state];
        while let Some(next) = state.successor() {
            state = next;
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                ConversionState::Analyzing,
                ConversionState::ModeSelected,
                ConversionState::ProcessingPages,
                ConversionState::Assembling,
                ConversionState::Done,
            ]
        );
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut orch =
            ConversionOrchestrator::new(CapabilitySet::empty(), ConversionConfig::default());
        assert!(orch.advance(ConversionState::Assembling).is_err());
        assert!(orch.advance(ConversionState::ModeSelected).is_ok());
        assert!(orch.advance(ConversionState::ModeSelected).is_err());
        assert_eq!(orch.state(), ConversionState::ModeSelected);
    }
}
