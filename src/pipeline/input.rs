//! Input validation: reject anything that is not a readable, reasonably sized
//! PDF before a single collaborator touches it.
//!
//! Backends report bad input with opaque codes (`FormatError`, "invalid
//! xref"). Checking existence, permissions, extension, the `%PDF` magic and
//! the size limit up front gives the caller an error that names the problem.

use crate::error::Pdf2MdError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A local PDF that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInput {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Validate a local PDF path.
pub fn validate_pdf(path: &Path, max_file_size_mb: u64) -> Result<ValidatedInput, Pdf2MdError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(Pdf2MdError::FileNotFound { path });
    }
    if !path.is_file() {
        return Err(Pdf2MdError::NotAPdf {
            path,
            reason: "Path is a directory, not a file.".to_string(),
        });
    }

    let has_pdf_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if !has_pdf_extension {
        return Err(Pdf2MdError::NotAPdf {
            path,
            reason: "Expected a .pdf extension.".to_string(),
        });
    }

    // Check read permission by attempting to open
    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2MdError::PermissionDenied { path });
        }
        Err(_) => return Err(Pdf2MdError::FileNotFound { path }),
    };

    // Verify PDF magic bytes
    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(Pdf2MdError::NotAPdf {
            path,
            reason: format!(
                "Expected %PDF header, found {:?}",
                String::from_utf8_lossy(&magic)
            ),
        });
    }

    let size_bytes = file
        .metadata()
        .map_err(|e| Pdf2MdError::Internal(format!("Cannot stat {}: {e}", path.display())))?
        .len();
    let size_mb = size_bytes as f64 / (1024.0 * 1024.0);
    if size_mb > max_file_size_mb as f64 {
        return Err(Pdf2MdError::FileTooLarge {
            path,
            size_mb,
            limit_mb: max_file_size_mb,
        });
    }

    debug!("Validated {} ({:.2} MB)", path.display(), size_mb);
    Ok(ValidatedInput { path, size_bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, bytes).unwrap();
        p
    }

    #[test]
    fn accepts_pdf_magic() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(dir.path(), "doc.PDF", b"%PDF-1.7\n%%EOF\n");
        let input = validate_pdf(&p, 100).unwrap();
        assert_eq!(input.size_bytes, 15);
    }

    #[test]
    fn missing_file() {
        let err = validate_pdf(Path::new("/nope/missing.pdf"), 100).unwrap_err();
        assert!(matches!(err, Pdf2MdError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(dir.path(), "doc.txt", b"%PDF-1.4");
        assert!(matches!(
            validate_pdf(&p, 100),
            Err(Pdf2MdError::NotAPdf { .. })
        ));
    }

    #[test]
    fn wrong_magic() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(dir.path(), "doc.pdf", b"PK\x03\x04zip");
        match validate_pdf(&p, 100) {
            Err(Pdf2MdError::NotAPdf { reason, .. }) => assert!(reason.contains("%PDF")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn too_large() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.resize(2 * 1024 * 1024, b' ');
        let p = write(dir.path(), "big.pdf", &bytes);
        assert!(matches!(
            validate_pdf(&p, 1),
            Err(Pdf2MdError::FileTooLarge { limit_mb: 1, .. })
        ));
    }
}
