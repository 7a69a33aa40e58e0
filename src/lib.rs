//! # tierpress
//!
//! Compress a PDF to fit under a target file size while keeping the leading
//! ("important") pages legible and squeezing every other page hard.
//!
//! Every page is rasterized to JPEG by ImageMagick and the JPEGs are packed
//! back into a fresh PDF. The first `important_pages` pages use a high DPI
//! and quality; the rest use a very low DPI and quality. If the result is
//! still above the target, every image is re-encoded once more at
//! [`EXTREME_QUALITY`] and the PDF is rebuilt. There is no further retry.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      validate path + %PDF magic, probe `magick --version`
//!  ├─ 2. Tiers      important pages at 200 DPI/q85, the rest at 35 DPI/q25
//!  ├─ 3. Assemble   pack JPEGs into one PDF (one page per image)
//!  ├─ 4. Measure    output ≤ target?  → done
//!  └─ 5. Extreme    re-encode every JPEG at q15, assemble, measure → done
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tierpress::{compress, CompressionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CompressionConfig::builder()
//!         .target_size_mb(4.5)
//!         .important_pages(5)
//!         .build()?;
//!     let result = compress("report.pdf", "report.small.pdf", &config).await?;
//!     if !result.success {
//!         eprintln!("target missed: {:.2}MB", result.final_size_mb);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tierpress` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Requirements
//!
//! ImageMagick 7 (`magick`) with Ghostscript for PDF input must be
//! installed. Its absence is detected before any work starts.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod compress;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use compress::{compress, compress_sync, compress_with, output_size_mb};
pub use config::{CompressionConfig, CompressionConfigBuilder, EXTREME_QUALITY};
pub use error::{CompressError, ErrorKind};
pub use output::{CompressionResult, CompressionStats, Tier, TierRange};
pub use pipeline::assemble::{DocumentAssembler, JpegPdfAssembler};
pub use pipeline::rasterize::{MagickRasterizer, PageRasterizer, RasterImage};
pub use pipeline::recompress::{ImageCompressor, JpegRecompressor};
pub use pipeline::Ports;
pub use progress::{CompressionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use workspace::Workspace;
