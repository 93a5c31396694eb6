//! The per-page extraction chain.
//!
//! An ordered list of strategies, cheapest first. Each strategy either
//! produces usable content, reports that its collaborator is absent, returns
//! too little text, or fails. The runner is one generic loop for both modes;
//! only the strategy list differs.
//!
//! ```text
//! Hybrid: native text ─▶ alternate text ─▶ rasterize (full-page image)
//! Ocr:    native text ─▶ alternate text ─▶ rasterize + OCR
//! ```
//!
//! Rasterize and OCR are expensive. They are withheld on pages outside the
//! sample and once the time budget is exhausted.

use super::assets::AssetStore;
use super::budget::TimeBudget;
use super::postprocess::clean_text;
use crate::capability::{CapabilityError, CapabilitySet, TextLayerReader};
use crate::config::{ConversionMode, PerformanceProfile};
use crate::error::{ErrorKind, PageError};
use crate::output::ExtractionMethod;
use crate::pipeline::classify::PageClassification;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Everything a strategy may look at for one page.
pub struct PageContext<'a> {
    pub pdf: &'a Path,
    pub page_index: usize,
    pub caps: &'a CapabilitySet,
    pub assets: &'a AssetStore,
    pub profile: &'a PerformanceProfile,
    pub budget: &'a TimeBudget,
    /// Analyzer output for this page, when it got that far.
    pub hint: Option<&'a PageClassification>,
    /// Whether the page is in the sample.
    pub sampled: bool,
    /// Embedded assets were already saved for this page.
    pub has_embedded_assets: bool,
}

/// Content produced by a successful attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyOutput {
    pub text: Option<String>,
    pub image_paths: Vec<String>,
}

/// Why an attempt did not produce usable content.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptError {
    /// No collaborator for this step on the host. A configuration fact.
    Unavailable,
    /// The step does not apply to this page.
    NotApplicable,
    /// Ran, but the text is below the usable threshold. Carries what it found.
    Insufficient(String),
    Failed(PageError),
}

/// One extraction method.
pub trait ExtractionStrategy: Send + Sync {
    fn method(&self) -> ExtractionMethod;

    /// Expensive steps are subject to sampling and the budget.
    fn is_expensive(&self) -> bool {
        false
    }

    fn attempt(&self, ctx: &PageContext<'_>) -> Result<StrategyOutput, AttemptError>;
}

// ── Strategies ───────────────────────────────────────────────────────────

fn read_failure(page_index: usize, method: ExtractionMethod, e: CapabilityError) -> PageError {
    match e {
        CapabilityError::Open { .. } => PageError::PageReadFailure {
            page: page_index + 1,
            detail: e.to_string(),
        },
        other => PageError::ExtractionFailure {
            page: page_index + 1,
            method: method.to_string(),
            detail: other.to_string(),
        },
    }
}

fn read_text(
    reader: Option<&Arc<dyn TextLayerReader>>,
    method: ExtractionMethod,
    min_chars: usize,
    ctx: &PageContext<'_>,
) -> Result<StrategyOutput, AttemptError> {
    let reader = reader.ok_or(AttemptError::Unavailable)?;
    let raw = reader
        .read_page_text(ctx.pdf, ctx.page_index)
        .map_err(|e| AttemptError::Failed(read_failure(ctx.page_index, method, e)))?;
    let text = clean_text(&raw);
    let chars = text.chars().count();
    trace!("Page {}: {} gave {} chars", ctx.page_index + 1, reader.name(), chars);
    if chars >= min_chars.max(1) {
        Ok(StrategyOutput {
            text: Some(text),
            image_paths: Vec::new(),
        })
    } else {
        Err(AttemptError::Insufficient(text))
    }
}

/// The preferred text layer.
pub struct NativeText {
    pub min_chars: usize,
}

impl ExtractionStrategy for NativeText {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::NativeText
    }

    fn attempt(&self, ctx: &PageContext<'_>) -> Result<StrategyOutput, AttemptError> {
        read_text(ctx.caps.text_layer.as_ref(), self.method(), self.min_chars, ctx)
    }
}

/// An independent decoder, redundancy against decoder-specific failures.
pub struct AlternateText {
    pub min_chars: usize,
}

impl ExtractionStrategy for AlternateText {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::AlternateText
    }

    fn attempt(&self, ctx: &PageContext<'_>) -> Result<StrategyOutput, AttemptError> {
        read_text(
            ctx.caps.alternate_text_layer.as_ref(),
            self.method(),
            self.min_chars,
            ctx,
        )
    }
}

/// Full-page raster kept as an image. Never used on pages whose embedded
/// assets were saved.
pub struct Rasterize;

impl ExtractionStrategy for Rasterize {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Rasterize
    }

    fn is_expensive(&self) -> bool {
        true
    }

    fn attempt(&self, ctx: &PageContext<'_>) -> Result<StrategyOutput, AttemptError> {
        if ctx.has_embedded_assets {
            return Err(AttemptError::NotApplicable);
        }
        let rasterizer = ctx.caps.rasterizer.as_ref().ok_or(AttemptError::Unavailable)?;
        let image = rasterizer
            .render_page(ctx.pdf, ctx.page_index, ctx.profile.raster_dpi)
            .map_err(|e| AttemptError::Failed(read_failure(ctx.page_index, self.method(), e)))?;
        let reference = ctx
            .assets
            .save(
                ctx.page_index,
                &AssetStore::full_page_file_name(ctx.page_index),
                &image,
            )
            .map_err(AttemptError::Failed)?;
        Ok(StrategyOutput {
            text: None,
            image_paths: vec![reference],
        })
    }
}

/// Rasterise at OCR resolution and recognise the pixels.
pub struct Ocr;

impl ExtractionStrategy for Ocr {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ocr
    }

    fn is_expensive(&self) -> bool {
        true
    }

    fn attempt(&self, ctx: &PageContext<'_>) -> Result<StrategyOutput, AttemptError> {
        let (Some(rasterizer), Some(engine)) = (ctx.caps.rasterizer.as_ref(), ctx.caps.ocr.as_ref())
        else {
            return Err(AttemptError::Unavailable);
        };
        let image = rasterizer
            .render_page(ctx.pdf, ctx.page_index, ctx.profile.ocr_dpi)
            .map_err(|e| AttemptError::Failed(read_failure(ctx.page_index, self.method(), e)))?;
        let raw = engine.recognize(&image).map_err(|e| {
            AttemptError::Failed(PageError::ExtractionFailure {
                page: ctx.page_index + 1,
                method: self.method().to_string(),
                detail: e.to_string(),
            })
        })?;
        let text = clean_text(&raw);
        if text.is_empty() {
            Err(AttemptError::Insufficient(text))
        } else {
            Ok(StrategyOutput {
                text: Some(text),
                image_paths: Vec::new(),
            })
        }
    }
}

// ── Runner ───────────────────────────────────────────────────────────────

/// Why expensive work was not started on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Withheld {
    Sampling,
    Budget,
}

/// What the chain produced for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome {
    pub text: Option<String>,
    pub image_paths: Vec<String>,
    pub method: ExtractionMethod,
    /// Set only when nothing was produced.
    pub error: Option<PageError>,
    pub warnings: Vec<PageError>,
    /// Set when an expensive step was skipped and nothing was produced.
    pub withheld: Option<Withheld>,
}

/// An ordered list of strategies.
pub struct ExtractionChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl ExtractionChain {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// The strategy list for a resolved mode.
    ///
    /// Hybrid accepts a shorter text layer than Ocr mode: in Ocr mode a thin
    /// text layer is worth replacing with recognised text.
    pub fn for_mode(mode: ConversionMode, profile: &PerformanceProfile) -> Self {
        match mode {
            ConversionMode::Hybrid => Self::new(vec![
                Box::new(NativeText {
                    min_chars: profile.hybrid_min_text_chars,
                }),
                Box::new(AlternateText {
                    min_chars: profile.hybrid_min_text_chars,
                }),
                Box::new(Rasterize),
            ]),
            ConversionMode::Ocr => Self::new(vec![
                Box::new(NativeText {
                    min_chars: profile.ocr_min_text_chars,
                }),
                Box::new(AlternateText {
                    min_chars: profile.ocr_min_text_chars,
                }),
                Box::new(Ocr),
            ]),
        }
    }

    pub fn methods(&self) -> Vec<ExtractionMethod> {
        self.strategies.iter().map(|s| s.method()).collect()
    }

    /// Run strategies in order until one produces usable content.
    ///
    /// Text found by a step that fell short is kept as the best partial
    /// result: it is returned when nothing better follows, and attached to an
    /// image-only success. `error` is set only when nothing was produced and
    /// no step ran cleanly.
    pub fn run(&self, ctx: &PageContext<'_>) -> ChainOutcome {
        let mut best_partial: Option<(ExtractionMethod, String)> = None;
        let mut last_error: Option<PageError> = None;
        let mut warnings = Vec::new();
        let mut withheld = None;
        let mut ran_cleanly = false;
        let mut attempted = false;
        if let Some(hint) = ctx.hint {
            trace!("Page {}: classified {:?}", ctx.page_index + 1, hint.category);
        }

        for strategy in &self.strategies {
            let method = strategy.method();
            if strategy.is_expensive() {
                if !ctx.sampled {
                    trace!("Page {}: {} withheld (not sampled)", ctx.page_index + 1, method);
                    withheld = Some(Withheld::Sampling);
                    continue;
                }
                if ctx.budget.is_exhausted() {
                    debug!("Page {}: {} withheld (budget)", ctx.page_index + 1, method);
                    withheld = Some(Withheld::Budget);
                    continue;
                }
            }

            match strategy.attempt(ctx) {
                Ok(output) => {
                    debug!("Page {}: extracted via {}", ctx.page_index + 1, method);
                    let text = output
                        .text
                        .or_else(|| best_partial.map(|(_, t)| t).filter(|t| !t.is_empty()));
                    return ChainOutcome {
                        text,
                        image_paths: output.image_paths,
                        method,
                        error: None,
                        warnings,
                        withheld: None,
                    };
                }
                Err(AttemptError::Unavailable) => {}
                Err(AttemptError::NotApplicable) => ran_cleanly = true,
                Err(AttemptError::Insufficient(text)) => {
                    attempted = true;
                    let longer = best_partial
                        .as_ref()
                        .is_none_or(|(_, best)| text.chars().count() > best.chars().count());
                    if longer {
                        best_partial = Some((method, text));
                    }
                }
                Err(AttemptError::Failed(e)) => {
                    attempted = true;
                    debug!("{}", e);
                    if e.kind() == ErrorKind::AssetWriteFailure {
                        warnings.push(e.clone());
                    }
                    last_error = Some(e);
                }
            }
        }

        if let Some((method, text)) = best_partial.filter(|(_, t)| !t.is_empty()) {
            return ChainOutcome {
                text: Some(text),
                image_paths: Vec::new(),
                method,
                error: None,
                warnings,
                withheld: None,
            };
        }

        let error = if ran_cleanly || withheld.is_some() {
            None
        } else if attempted {
            last_error
        } else {
            Some(PageError::CapabilityUnavailable {
                page: ctx.page_index + 1,
                capability: "any extraction method".to_string(),
            })
        };

        ChainOutcome {
            text: None,
            image_paths: Vec::new(),
            method: ExtractionMethod::None,
            error,
            warnings,
            withheld,
        }
    }
}
