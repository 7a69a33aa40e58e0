//! Configuration types for tiered PDF compression.
//!
//! All run behaviour is controlled through [`CompressionConfig`], built via
//! its [`CompressionConfigBuilder`]. A config is immutable for the duration of
//! a run: the pipeline only ever borrows it.

use crate::error::CompressError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// JPEG quality applied to every image during the extreme pass.
pub const EXTREME_QUALITY: u8 = 15;

/// Name of the ImageMagick 7 entry point looked up on `PATH` by default.
pub const DEFAULT_MAGICK_BINARY: &str = "magick";

/// Configuration for a compression run.
///
/// Built via [`CompressionConfig::builder()`] or using
/// [`CompressionConfig::default()`].
///
/// # Example
/// ```rust
/// use tierpress::CompressionConfig;
///
/// let config = CompressionConfig::builder()
///     .target_size_mb(2.0)
///     .important_pages(3)
///     .first_page_dpi(150)
///     .build()
///     .unwrap();
/// assert_eq!(config.important_pages, 3);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Desired maximum output size in binary megabytes. Default: 4.5.
    pub target_size_mb: f64,

    /// Number of leading pages rendered with the high-quality settings. Default: 5.
    ///
    /// Values larger than the document's page count simply put every page in
    /// the important tier.
    pub important_pages: usize,

    /// JPEG quality (1–100) for the important tier. Default: 85.
    pub first_page_quality: u8,

    /// JPEG quality (1–100) for the remaining tier. Default: 25.
    pub remaining_quality: u8,

    /// Rasterization DPI for the important tier. Default: 200.
    pub first_page_dpi: u32,

    /// Rasterization DPI for the remaining tier. Default: 35.
    ///
    /// Low enough that body pages become thumbnails; that is the point of
    /// the remaining tier.
    pub remaining_dpi: u32,

    /// ImageMagick executable. Default: `magick` resolved through `PATH`.
    pub magick_binary: PathBuf,

    /// Per-page timeout for the external rasterizer in seconds. Default: none.
    pub tool_timeout_secs: Option<u64>,

    /// Run the two tiers on separate threads. Default: false.
    ///
    /// The tiers write disjoint files, so this is safe; it only pays off on
    /// documents with many important pages.
    pub concurrent_tiers: bool,

    /// Optional receiver for stage events.
    #[serde(skip)]
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            target_size_mb: 4.5,
            important_pages: 5,
            first_page_quality: 85,
            remaining_quality: 25,
            first_page_dpi: 200,
            remaining_dpi: 35,
            magick_binary: PathBuf::from(DEFAULT_MAGICK_BINARY),
            tool_timeout_secs: None,
            concurrent_tiers: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CompressionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionConfig")
            .field("target_size_mb", &self.target_size_mb)
            .field("important_pages", &self.important_pages)
            .field("first_page_quality", &self.first_page_quality)
            .field("remaining_quality", &self.remaining_quality)
            .field("first_page_dpi", &self.first_page_dpi)
            .field("remaining_dpi", &self.remaining_dpi)
            .field("magick_binary", &self.magick_binary)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("concurrent_tiers", &self.concurrent_tiers)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn CompressionProgressCallback>"),
            )
            .finish()
    }
}

impl CompressionConfig {
    /// Create a new builder for `CompressionConfig`.
    pub fn builder() -> CompressionConfigBuilder {
        CompressionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check every field against its allowed range.
    ///
    /// Called by [`CompressionConfigBuilder::build`] and again at the start of
    /// a run, since the fields are public and may be edited after building.
    pub fn validate(&self) -> Result<(), CompressError> {
        if !self.target_size_mb.is_finite() || self.target_size_mb <= 0.0 {
            return Err(CompressError::InvalidConfig(format!(
                "Target size must be a positive number of MB, got {}",
                self.target_size_mb
            )));
        }
        for (name, q) in [
            ("first-page quality", self.first_page_quality),
            ("remaining quality", self.remaining_quality),
        ] {
            if !(1..=100).contains(&q) {
                return Err(CompressError::InvalidConfig(format!(
                    "{name} must be 1–100, got {q}"
                )));
            }
        }
        for (name, dpi) in [
            ("first-page DPI", self.first_page_dpi),
            ("remaining DPI", self.remaining_dpi),
        ] {
            if dpi == 0 {
                return Err(CompressError::InvalidConfig(format!(
                    "{name} must be ≥ 1, got {dpi}"
                )));
            }
        }
        if self.tool_timeout_secs == Some(0) {
            return Err(CompressError::InvalidConfig(
                "Tool timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`CompressionConfig`].
#[derive(Debug)]
pub struct CompressionConfigBuilder {
    config: CompressionConfig,
}

impl CompressionConfigBuilder {
    pub fn target_size_mb(mut self, mb: f64) -> Self {
        self.config.target_size_mb = mb;
        self
    }

    pub fn important_pages(mut self, n: usize) -> Self {
        self.config.important_pages = n;
        self
    }

    pub fn first_page_quality(mut self, q: u8) -> Self {
        self.config.first_page_quality = q;
        self
    }

    pub fn remaining_quality(mut self, q: u8) -> Self {
        self.config.remaining_quality = q;
        self
    }

    pub fn first_page_dpi(mut self, dpi: u32) -> Self {
        self.config.first_page_dpi = dpi;
        self
    }

    pub fn remaining_dpi(mut self, dpi: u32) -> Self {
        self.config.remaining_dpi = dpi;
        self
    }

    pub fn magick_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.magick_binary = path.into();
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = Some(secs);
        self
    }

    pub fn concurrent_tiers(mut self, v: bool) -> Self {
        self.config.concurrent_tiers = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CompressionConfig, CompressError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
