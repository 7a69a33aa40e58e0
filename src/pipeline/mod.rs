//! Pipeline stages for tiered PDF compression.
//!
//! Each submodule implements exactly one step. The three external
//! collaborators (rasterizer, image codec, PDF packer) sit behind traits and
//! travel together in [`Ports`], so the controller can be exercised against
//! fakes without ImageMagick installed.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ tiers ──▶ rasterize ──▶ recompress ──▶ assemble
//! (checks)  (split)   (magick)      (image)        (lopdf)
//! ```
//!
//! 1. [`input`]     : validate the input path before any work starts
//! 2. [`tiers`]     : split pages into the important and remaining tiers
//! 3. [`rasterize`] : render one JPEG per page via ImageMagick
//! 4. [`recompress`]: re-encode a JPEG in place at a given quality
//! 5. [`assemble`]  : pack the ordered JPEGs into the output PDF

pub mod assemble;
pub mod input;
pub mod rasterize;
pub mod recompress;
pub mod tiers;

use crate::config::CompressionConfig;
use assemble::{DocumentAssembler, JpegPdfAssembler};
use rasterize::{MagickRasterizer, PageRasterizer};
use recompress::{ImageCompressor, JpegRecompressor};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The external collaborators used by a run.
#[derive(Clone)]
pub struct Ports {
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub compressor: Arc<dyn ImageCompressor>,
    pub assembler: Arc<dyn DocumentAssembler>,
}

impl Ports {
    /// ImageMagick + `image` JPEG codec + `lopdf` packer, configured from `config`.
    pub fn system(config: &CompressionConfig) -> Self {
        let mut rasterizer = MagickRasterizer::new(&config.magick_binary);
        if let Some(secs) = config.tool_timeout_secs {
            rasterizer = rasterizer.with_timeout(Duration::from_secs(secs));
        }
        Self {
            rasterizer: Arc::new(rasterizer),
            compressor: Arc::new(JpegRecompressor),
            assembler: Arc::new(JpegPdfAssembler),
        }
    }
}

impl fmt::Debug for Ports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ports")
            .field("rasterizer", &"<dyn PageRasterizer>")
            .field("compressor", &"<dyn ImageCompressor>")
            .field("assembler", &"<dyn DocumentAssembler>")
            .finish()
    }
}
