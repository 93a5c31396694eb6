//! Pipeline stages for adaptive PDF-to-Markdown conversion.
//!
//! Each submodule implements one step. Only [`orchestrator`] knows the order;
//! the stages themselves talk to the host exclusively through
//! [`crate::capability`] traits, so every one of them runs against fakes in
//! tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ document ──▶ analyze ──▶ sample ──▶ chain ──▶ assemble
//! (magic,   (page      (classify   (large    (per-page  (header, pages,
//!  size)     count)     each page)  docs)     fallback)  summary)
//!                                               │
//!                                               └──▶ assets (PNG sidecar dir)
//! ```
//!
//! 1. [`input`]   : reject missing, unreadable, non-PDF or oversized files
//! 2. [`document`]: open once and learn the page count
//! 3. [`analyze`] : [`classify`] every page and recommend a mode; stops
//!    early when the [`budget`] runs out
//! 4. [`sample`]  : restrict expensive work to head, tail and visual pages
//!    of large documents
//! 5. [`chain`]   : native text, alternate text, rasterize, OCR; first
//!    sufficient result wins
//! 6. [`assemble`]: render results in page order; [`postprocess`] cleans
//!    both page text and the final document

pub mod analyze;
pub mod assemble;
pub mod assets;
pub mod budget;
pub mod chain;
pub mod classify;
pub mod document;
pub mod input;
pub mod orchestrator;
pub mod postprocess;
pub mod sample;
