//! Progress-callback trait for compression stage events.
//!
//! Inject an [`Arc<dyn CompressionProgressCallback>`] via
//! [`crate::config::CompressionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages.
//!
//! # Example
//!
//! ```rust
//! use tierpress::{CompressionConfig, CompressionProgressCallback, Tier};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     pages: AtomicUsize,
//! }
//!
//! impl CompressionProgressCallback for CountingCallback {
//!     fn on_page_rasterized(&self, _tier: Tier, page: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page} done");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { pages: AtomicUsize::new(0) });
//!
//! let config = CompressionConfig::builder()
//!     .progress_callback(counter as Arc<dyn CompressionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{CompressionResult, Tier};
use std::sync::Arc;

/// Called by the pipeline as it runs.
///
/// Implementations must be `Send + Sync`: with `concurrent_tiers` enabled the
/// two tiers report from different threads. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait CompressionProgressCallback: Send + Sync {
    /// Called once the page count is known, before any page is rasterized.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a tier starts rasterising `pages` pages.
    fn on_tier_start(&self, tier: Tier, pages: usize) {
        let _ = (tier, pages);
    }

    /// Called after a page has been rasterized and recompressed.
    ///
    /// `page` is 0-based.
    fn on_page_rasterized(&self, tier: Tier, page: usize) {
        let _ = (tier, page);
    }

    /// Called when a tier has finished; `images` may be below its page count.
    fn on_tier_complete(&self, tier: Tier, images: usize) {
        let _ = (tier, images);
    }

    /// Called after the first assembly has been measured.
    fn on_first_pass_complete(&self, size_mb: f64, target_mb: f64) {
        let _ = (size_mb, target_mb);
    }

    /// Called when the first pass missed the target and the extreme pass begins.
    fn on_extreme_pass_start(&self, images: usize, quality: u8) {
        let _ = (images, quality);
    }

    /// Called once with the final outcome.
    fn on_run_complete(&self, result: &CompressionResult) {
        let _ = result;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CompressionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CompressionConfig`].
pub type ProgressCallback = Arc<dyn CompressionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CompressionStats;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        started_total: AtomicUsize,
        pages: AtomicUsize,
        extreme: AtomicUsize,
    }

    impl CompressionProgressCallback for TrackingCallback {
        fn on_run_start(&self, total_pages: usize) {
            self.started_total.store(total_pages, Ordering::SeqCst);
        }

        fn on_page_rasterized(&self, _tier: Tier, _page: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_extreme_pass_start(&self, _images: usize, _quality: u8) {
            self.extreme.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(5);
        cb.on_tier_start(Tier::Important, 5);
        cb.on_page_rasterized(Tier::Important, 0);
        cb.on_tier_complete(Tier::Important, 1);
        cb.on_first_pass_complete(1.0, 4.5);
        cb.on_extreme_pass_start(1, 15);
        cb.on_run_complete(&CompressionResult {
            success: true,
            final_size_mb: 1.0,
            stats: CompressionStats::default(),
        });
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_run_start(3);
        tracker.on_page_rasterized(Tier::Important, 0);
        tracker.on_page_rasterized(Tier::Remaining, 1);
        tracker.on_extreme_pass_start(2, 15);

        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.extreme.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(10);
        cb.on_tier_start(Tier::Remaining, 5);
    }
}
