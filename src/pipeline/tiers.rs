//! Tiered conversion: split the document into the important and remaining
//! tiers and rasterize each with its own DPI/quality.
//!
//! The two ranges are disjoint and together cover `[0, total_pages)`. Each
//! tier writes only its own `page_{i}.jpg` files, so the tiers may run on
//! separate threads without coordinating.

use crate::config::CompressionConfig;
use crate::error::CompressError;
use crate::output::{Tier, TierRange};
use crate::pipeline::rasterize::{rasterize, RasterImage, RasterJob};
use crate::pipeline::Ports;
use crate::workspace::Workspace;
use std::path::Path;
use tracing::info;

/// Compute the two tier ranges for a document of `total_pages` pages.
///
/// Returns `[important, remaining]`. Either range may be empty.
pub fn plan_tiers(config: &CompressionConfig, total_pages: usize) -> [TierRange; 2] {
    let split = config.important_pages.min(total_pages);
    [
        TierRange {
            tier: Tier::Important,
            start: 0,
            end: split,
            dpi: config.first_page_dpi,
            quality: config.first_page_quality,
        },
        TierRange {
            tier: Tier::Remaining,
            start: split,
            end: total_pages,
            dpi: config.remaining_dpi,
            quality: config.remaining_quality,
        },
    ]
}

/// Images produced by both tiers, each in ascending page order.
#[derive(Debug, Default)]
pub struct TierImages {
    pub important: Vec<RasterImage>,
    pub remaining: Vec<RasterImage>,
}

impl TierImages {
    /// All images in document order: important tier first.
    pub fn into_ordered(self) -> Vec<RasterImage> {
        let mut all = self.important;
        all.extend(self.remaining);
        all
    }
}

/// Rasterize one tier, reporting progress through the config's callback.
fn run_tier(
    ports: &Ports,
    config: &CompressionConfig,
    document: &Path,
    workspace: &Workspace,
    range: &TierRange,
) -> Result<Vec<RasterImage>, CompressError> {
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_tier_start(range.tier, range.len());
    }
    info!(
        "Processing {} tier: pages {}..{} at {} DPI, q={}",
        range.tier, range.start, range.end, range.dpi, range.quality
    );

    let job = RasterJob {
        document,
        output_dir: workspace.path(),
        start_page: range.start,
        end_page: Some(range.end),
        dpi: range.dpi,
        quality: range.quality,
    };
    let images = rasterize(
        ports.rasterizer.as_ref(),
        ports.compressor.as_ref(),
        &job,
        |page| {
            if let Some(cb) = cb {
                cb.on_page_rasterized(range.tier, page);
            }
        },
    )?;

    if let Some(cb) = cb {
        cb.on_tier_complete(range.tier, images.len());
    }
    Ok(images)
}

/// Run both tiers, sequentially or on two scoped threads.
pub fn convert_tiers(
    ports: &Ports,
    config: &CompressionConfig,
    document: &Path,
    workspace: &Workspace,
    total_pages: usize,
) -> Result<TierImages, CompressError> {
    let [important, remaining] = plan_tiers(config, total_pages);

    if !config.concurrent_tiers {
        let important = run_tier(ports, config, document, workspace, &important)?;
        let remaining = run_tier(ports, config, document, workspace, &remaining)?;
        return Ok(TierImages {
            important,
            remaining,
        });
    }

    std::thread::scope(|s| {
        let handle = s.spawn(|| run_tier(ports, config, document, workspace, &remaining));
        let important = run_tier(ports, config, document, workspace, &important);
        let remaining = handle
            .join()
            .map_err(|_| CompressError::Internal("remaining tier thread panicked".into()))?;
        Ok(TierImages {
            important: important?,
            remaining: remaining?,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(important: usize) -> CompressionConfig {
        CompressionConfig::builder()
            .important_pages(important)
            .build()
            .unwrap()
    }

    #[test]
    fn ten_pages_split_five_five() {
        let [imp, rem] = plan_tiers(&config(5), 10);
        assert_eq!((imp.start, imp.end, imp.dpi, imp.quality), (0, 5, 200, 85));
        assert_eq!((rem.start, rem.end, rem.dpi, rem.quality), (5, 10, 35, 25));
    }

    #[test]
    fn important_beyond_page_count_empties_remaining() {
        let [imp, rem] = plan_tiers(&config(8), 3);
        assert_eq!(imp.pages(), 0..3);
        assert!(rem.is_empty());
    }

    #[test]
    fn ranges_are_disjoint_and_cover_document() {
        for important in 0..12 {
            for total in 0..12 {
                let [imp, rem] = plan_tiers(&config(important), total);
                let split = important.min(total);
                assert_eq!(imp.pages(), 0..split);
                assert_eq!(rem.pages(), split..total);

                let mut all: Vec<usize> = imp.pages().chain(rem.pages()).collect();
                let len = all.len();
                all.dedup();
                assert_eq!(all.len(), len, "overlap at important={important} total={total}");
                assert_eq!(all, (0..total).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn ordered_images_put_important_first() {
        let img = |page| RasterImage {
            path: format!("page_{page}.jpg").into(),
            page,
            quality: 1,
        };
        let tiers = TierImages {
            important: vec![img(0), img(1)],
            remaining: vec![img(2), img(3)],
        };
        let pages: Vec<usize> = tiers.into_ordered().iter().map(|i| i.page).collect();
        assert_eq!(pages, vec![0, 1, 2, 3]);
    }
}
