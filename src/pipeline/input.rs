//! Input validation: make sure the user-supplied path is a readable PDF.
//!
//! Runs before the dependency probe and before any workspace exists, so a bad
//! path fails fast with no temporary files created. The PDF magic bytes
//! (`%PDF`) are checked here so callers get a meaningful error rather than an
//! opaque ImageMagick failure on page 0.

use crate::error::CompressError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` exists, is readable and starts with `%PDF`.
///
/// Files shorter than four bytes skip the magic check and are left for the
/// page counter to reject.
pub fn validate_input(path: &Path) -> Result<PathBuf, CompressError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(CompressError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(CompressError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(CompressError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(CompressError::FileNotFound { path });
        }
    }

    debug!("Validated input PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = validate_input(Path::new("/definitely/not/a/real/file.pdf")).unwrap_err();
        assert!(matches!(err, CompressError::FileNotFound { .. }), "got: {err}");
    }

    #[test]
    fn wrong_magic_is_not_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"GIF89a....").unwrap();

        match validate_input(&path).unwrap_err() {
            CompressError::NotAPdf { magic, .. } => assert_eq!(&magic, b"GIF8"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn pdf_header_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.pdf");
        std::fs::write(&path, b"%PDF-1.5\n%%EOF\n").unwrap();
        assert_eq!(validate_input(&path).unwrap(), path);
    }
}
