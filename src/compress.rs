//! Compression entry points and the two-pass escalation policy.
//!
//! A run moves through a fixed sequence of states:
//!
//! ```text
//! START ──▶ FIRST_PASS ──▶ SIZE_CHECK ──▶ DONE (success)
//!                               │
//!                               └──▶ EXTREME_PASS ──▶ SIZE_CHECK_2 ──▶ DONE
//! ```
//!
//! There is at most one retry. If the output is still above the target after
//! every image has been re-encoded at [`EXTREME_QUALITY`], the run returns
//! `success = false` with the achieved size; it does not search further.

use crate::config::{CompressionConfig, EXTREME_QUALITY};
use crate::error::CompressError;
use crate::output::{CompressionResult, CompressionStats};
use crate::pipeline::{input, tiers, Ports};
use crate::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Compress `input` into `output` using ImageMagick and the built-in codecs.
///
/// The pipeline is blocking (external processes, JPEG codec), so it runs on
/// tokio's blocking thread pool.
///
/// # Errors
/// Returns `Err(CompressError)` only for fatal conditions: missing input,
/// missing ImageMagick, or any rasterization/encoding/assembly failure.
/// Missing the target size is reported as `Ok` with `success == false`.
pub async fn compress(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &CompressionConfig,
) -> Result<CompressionResult, CompressError> {
    let input = input.as_ref().to_path_buf();
    let output = output.as_ref().to_path_buf();
    let config = config.clone();

    tokio::task::spawn_blocking(move || {
        let ports = Ports::system(&config);
        compress_with(&ports, &input, &output, &config)
    })
    .await
    .map_err(|e| CompressError::Internal(format!("Compression task panicked: {}", e)))?
}

/// Blocking variant of [`compress`] for callers without a tokio runtime.
pub fn compress_sync(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &CompressionConfig,
) -> Result<CompressionResult, CompressError> {
    compress_with(&Ports::system(config), input, output, config)
}

/// Run the full pipeline against an explicit set of [`Ports`].
///
/// The workspace holding intermediate images is created after the input and
/// dependency checks pass and is removed on every exit path.
pub fn compress_with(
    ports: &Ports,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &CompressionConfig,
) -> Result<CompressionResult, CompressError> {
    let total_start = Instant::now();
    let output = output.as_ref();
    let cb = config.progress_callback.as_ref();

    // ── START ────────────────────────────────────────────────────────────
    config.validate()?;
    let input = input::validate_input(input.as_ref())?;
    let banner = ports.rasterizer.probe()?;
    debug!("Rasterizer: {}", banner);

    info!("Starting compression: {}", input.display());
    let workspace = Workspace::new()?;
    let total_pages = ports.rasterizer.page_count(&input)?;
    info!("PDF has {} pages", total_pages);
    if let Some(cb) = cb {
        cb.on_run_start(total_pages);
    }

    // ── FIRST_PASS ───────────────────────────────────────────────────────
    let raster_start = Instant::now();
    let tier_images = tiers::convert_tiers(ports, config, &input, &workspace, total_pages)?;
    let raster_duration_ms = raster_start.elapsed().as_millis() as u64;

    let mut stats = CompressionStats {
        total_pages,
        important_pages: tier_images.important.len(),
        remaining_pages: tier_images.remaining.len(),
        raster_duration_ms,
        ..Default::default()
    };

    let mut images = tier_images.into_ordered();
    if images.is_empty() {
        return Err(CompressError::NoImagesProduced);
    }
    stats.images_assembled = images.len();

    let paths: Vec<PathBuf> = images.iter().map(|img| img.path.clone()).collect();
    info!("Converting {} compressed images back to PDF", paths.len());
    ports.assembler.assemble(&paths, output)?;

    // ── SIZE_CHECK ───────────────────────────────────────────────────────
    let first_size = output_size_mb(output)?;
    stats.first_pass_size_mb = first_size;
    info!("First-pass PDF size: {:.2}MB", first_size);
    if let Some(cb) = cb {
        cb.on_first_pass_complete(first_size, config.target_size_mb);
    }

    if first_size <= config.target_size_mb {
        return Ok(finish(true, first_size, stats, total_start, config, workspace));
    }

    // ── EXTREME_PASS ─────────────────────────────────────────────────────
    info!(
        "{:.2}MB exceeds target {:.2}MB; recompressing {} images at q={}",
        first_size,
        config.target_size_mb,
        images.len(),
        EXTREME_QUALITY
    );
    if let Some(cb) = cb {
        cb.on_extreme_pass_start(images.len(), EXTREME_QUALITY);
    }
    stats.extreme_pass = true;

    for image in &mut images {
        ports.compressor.recompress(&image.path, EXTREME_QUALITY, true)?;
        image.quality = EXTREME_QUALITY;
    }
    ports.assembler.assemble(&paths, output)?;

    // ── SIZE_CHECK_2 ─────────────────────────────────────────────────────
    let final_size = output_size_mb(output)?;
    info!("PDF size after extreme compression: {:.2}MB", final_size);
    let success = final_size <= config.target_size_mb;
    if !success {
        warn!(
            "Could not reach target size of {}MB (final size {:.2}MB)",
            config.target_size_mb, final_size
        );
    }

    Ok(finish(success, final_size, stats, total_start, config, workspace))
}

/// Size of `path` in binary megabytes.
pub fn output_size_mb(path: &Path) -> Result<f64, CompressError> {
    let meta = std::fs::metadata(path).map_err(|e| CompressError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(meta.len() as f64 / BYTES_PER_MB)
}

fn finish(
    success: bool,
    final_size_mb: f64,
    mut stats: CompressionStats,
    started: Instant,
    config: &CompressionConfig,
    workspace: Workspace,
) -> CompressionResult {
    workspace.close();
    stats.total_duration_ms = started.elapsed().as_millis() as u64;

    let result = CompressionResult {
        success,
        final_size_mb,
        stats,
    };
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(&result);
    }
    info!(
        "Compression complete: {:.2}MB (target {}MB) in {}ms",
        final_size_mb, config.target_size_mb, result.stats.total_duration_ms
    );
    result
}
