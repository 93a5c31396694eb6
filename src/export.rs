//! Hand-off of the assembled Markdown to `pandoc` for other formats.
//!
//! The pipeline's product is one Markdown file with resolvable image
//! references. Everything past that is pandoc's job; this module only maps a
//! closed set of formats to pandoc arguments and runs it next to the Markdown
//! file so relative image paths resolve.

use crate::error::Pdf2MdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::process::Command;
use tracing::{debug, info};

const PANDOC: &str = "pandoc";

/// Output formats the CLI can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The Markdown itself; no conversion.
    #[default]
    Markdown,
    Html,
    Docx,
    Txt,
    Rtf,
    Odt,
    Epub,
    Latex,
    Json,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 9] = [
        OutputFormat::Markdown,
        OutputFormat::Html,
        OutputFormat::Docx,
        OutputFormat::Txt,
        OutputFormat::Rtf,
        OutputFormat::Odt,
        OutputFormat::Epub,
        OutputFormat::Latex,
        OutputFormat::Json,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
            OutputFormat::Docx => "docx",
            OutputFormat::Txt => "txt",
            OutputFormat::Rtf => "rtf",
            OutputFormat::Odt => "odt",
            OutputFormat::Epub => "epub",
            OutputFormat::Latex => "tex",
            OutputFormat::Json => "json",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "Markdown",
            OutputFormat::Html => "HTML",
            OutputFormat::Docx => "Microsoft Word Document",
            OutputFormat::Txt => "Plain Text",
            OutputFormat::Rtf => "Rich Text Format",
            OutputFormat::Odt => "OpenDocument Text",
            OutputFormat::Epub => "EPUB eBook",
            OutputFormat::Latex => "LaTeX",
            OutputFormat::Json => "Pandoc JSON AST",
        }
    }

    /// Format-specific pandoc arguments.
    fn pandoc_args(&self) -> &'static [&'static str] {
        match self {
            OutputFormat::Markdown => &[],
            OutputFormat::Html => &["--standalone"],
            OutputFormat::Txt => &["--to", "plain", "--wrap=none"],
            OutputFormat::Latex => &["--standalone"],
            OutputFormat::Json => &["--to", "json"],
            OutputFormat::Docx | OutputFormat::Rtf | OutputFormat::Odt | OutputFormat::Epub => &[],
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Pdf2MdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            "html" | "htm" => Ok(OutputFormat::Html),
            "docx" | "word" => Ok(OutputFormat::Docx),
            "txt" | "text" | "plain" => Ok(OutputFormat::Txt),
            "rtf" => Ok(OutputFormat::Rtf),
            "odt" => Ok(OutputFormat::Odt),
            "epub" => Ok(OutputFormat::Epub),
            "latex" | "tex" => Ok(OutputFormat::Latex),
            "json" => Ok(OutputFormat::Json),
            other => Err(Pdf2MdError::InvalidConfig(format!(
                "Unknown output format '{other}' (expected one of: md, html, docx, txt, rtf, odt, epub, latex, json)"
            ))),
        }
    }
}

/// Whether `pandoc` can be spawned.
pub fn pandoc_available() -> bool {
    crate::capability::command_available(PANDOC, "--version")
}

/// Convert `markdown_path` into `format` next to it.
///
/// `extra_args` is split on whitespace and appended after the format's own
/// arguments. Returns the produced file; for [`OutputFormat::Markdown`] that
/// is `markdown_path` itself.
pub async fn export_markdown(
    markdown_path: &Path,
    format: OutputFormat,
    extra_args: Option<&str>,
) -> Result<PathBuf, Pdf2MdError> {
    if format == OutputFormat::Markdown {
        return Ok(markdown_path.to_path_buf());
    }
    if !pandoc_available() {
        return Err(Pdf2MdError::ExportFailed {
            format: format.to_string(),
            detail: "pandoc is not installed (https://pandoc.org/installing.html)".to_string(),
        });
    }

    let target = markdown_path.with_extension(format.extension());
    let workdir = markdown_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let input_name = file_name(markdown_path)?;
    let output_name = file_name(&target)?;

    let mut cmd = Command::new(PANDOC);
    cmd.current_dir(workdir)
        .args(["--from", "markdown"])
        .args(format.pandoc_args())
        .args(extra_args.unwrap_or_default().split_whitespace())
        .arg(&input_name)
        .arg("-o")
        .arg(&output_name);
    debug!("pandoc in {}: {:?}", workdir.display(), cmd);

    let output = cmd.output().await.map_err(|e| Pdf2MdError::ExportFailed {
        format: format.to_string(),
        detail: e.to_string(),
    })?;
    if !output.status.success() {
        return Err(Pdf2MdError::ExportFailed {
            format: format.to_string(),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    info!("Exported {} → {}", markdown_path.display(), target.display());
    Ok(target)
}

fn file_name(path: &Path) -> Result<std::ffi::OsString, Pdf2MdError> {
    path.file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| Pdf2MdError::Internal(format!("{} has no file name", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_format() {
        for format in OutputFormat::ALL {
            assert_eq!(format.extension().parse::<OutputFormat>().unwrap(), format);
        }
        assert_eq!("LaTeX".parse::<OutputFormat>().unwrap(), OutputFormat::Latex);
        assert!("pdf".parse::<OutputFormat>().is_err());
    }

    #[tokio::test]
    async fn markdown_is_a_no_op() {
        let p = Path::new("out/doc_hybrid.md");
        let out = export_markdown(p, OutputFormat::Markdown, Some("--toc")).await.unwrap();
        assert_eq!(out, p);
    }
}
