//! Error types for the tierpress library.
//!
//! Every variant of [`CompressError`] is **fatal** for the run: the output
//! path must be treated as untrustworthy once one is returned. Missing the
//! target size is *not* an error; it is reported through
//! [`crate::output::CompressionResult::success`] because the output file is
//! still valid and complete.
//!
//! Variants are grouped into the coarse [`ErrorKind`] taxonomy so the CLI can
//! print a distinct message per kind without matching every variant.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the tierpress library.
#[derive(Debug, Error)]
pub enum CompressError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Dependency errors ─────────────────────────────────────────────────
    /// The external rasterizer could not be executed.
    #[error(
        "{tool} is not installed or not executable: {detail}\n\
Install ImageMagick 7 (https://imagemagick.org) or pass --magick /path/to/magick."
    )]
    MissingDependency { tool: String, detail: String },

    // ── Compression errors ────────────────────────────────────────────────
    /// The PDF could not be opened to read its page count.
    #[error("PDF '{path}' could not be read: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The external rasterizer failed for a specific page (0-based index).
    #[error("Failed to convert page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The external rasterizer exceeded the configured timeout.
    #[error("{tool} timed out after {secs}s on page {page}")]
    ToolTimedOut { tool: String, page: usize, secs: u64 },

    /// Decoding or re-encoding an intermediate image failed.
    #[error("Failed to compress image {path}: {detail}")]
    ImageCompressionFailed { path: PathBuf, detail: String },

    /// Neither tier produced a single image.
    #[error("No images were produced during conversion")]
    NoImagesProduced,

    /// Packing the images into a PDF failed.
    #[error("Failed to assemble output PDF: {detail}")]
    AssemblyFailed { detail: String },

    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`CompressError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input document is missing or unusable as a file.
    NotFound,
    /// The external rasterizer is absent.
    MissingDependency,
    /// Rasterization, recompression or reassembly failed.
    CompressionFailure,
    /// The configuration was rejected before any work started.
    InvalidConfig,
    /// Anything else.
    Internal,
}

impl CompressError {
    /// Map this error onto the [`ErrorKind`] taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompressError::FileNotFound { .. }
            | CompressError::PermissionDenied { .. }
            | CompressError::NotAPdf { .. } => ErrorKind::NotFound,
            CompressError::MissingDependency { .. } => ErrorKind::MissingDependency,
            CompressError::CorruptPdf { .. }
            | CompressError::RasterisationFailed { .. }
            | CompressError::ToolTimedOut { .. }
            | CompressError::ImageCompressionFailed { .. }
            | CompressError::NoImagesProduced
            | CompressError::AssemblyFailed { .. }
            | CompressError::OutputWriteFailed { .. } => ErrorKind::CompressionFailure,
            CompressError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            CompressError::Internal(_) => ErrorKind::Internal,
        }
    }
}
