//! Post-processing: deterministic cleanup of extracted page text and of the
//! assembled document.
//!
//! Text layers and OCR engines both produce noisy whitespace: CRLF line ends,
//! zero-width joiners left by the PDF producer, indentation runs from column
//! layout, and blank lines between every text run. None of it carries meaning
//! in Markdown, so every text result is cleaned once, before it is stored in
//! its [`crate::output::ExtractionResult`]. The assembler never re-cleans page
//! text; it only normalises the final document layout.
//!
//! ## Rule Order
//!
//! Line endings are normalised before anything splits on `\n`, invisible
//! characters are removed before trimming so a line holding only a BOM counts
//! as blank, and space collapsing runs last on the surviving lines.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean one page's raw text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Trim every line and drop blank ones
/// 4. Collapse runs of spaces and tabs to a single space
///
/// Returns an empty string when nothing readable remains.
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = drop_blank_lines(&s);
    collapse_spaces(&s)
}

/// Normalise the assembled Markdown document.
///
/// 1. Trim trailing whitespace on lines that carry no Markdown hard break
/// 2. Collapse 3+ consecutive blank lines down to 2
/// 3. Ensure the file ends with exactly one newline
pub fn finalize_document(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{0000}',
        ],
        "",
    )
}

// ── Rule 3: Trim lines, drop blank ones ─────────────────────────────────────

fn drop_blank_lines(input: &str) -> String {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse whitespace runs ────────────────────────────────────────

static RE_SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00A0}]{2,}|\t").unwrap());

fn collapse_spaces(input: &str) -> String {
    RE_SPACE_RUNS.replace_all(input, " ").to_string()
}

// ── Rule 5: Trim trailing whitespace, keeping hard breaks ───────────────────
//
// The document header ends its metadata lines with two spaces, a Markdown
// hard line break. Any other trailing whitespace is noise.

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| {
            let trimmed = line.trim_end();
            if !trimmed.is_empty() && &line[trimmed.len()..] == "  " {
                line.to_string()
            } else {
                trimmed.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 6: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 7: Ensure file ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
