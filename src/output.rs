//! Result types returned by a compression run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// One of the two page ranges sharing a DPI/quality setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Leading pages kept at high resolution and quality.
    Important,
    /// Every page after the important tier.
    Remaining,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Important => f.write_str("important"),
            Tier::Remaining => f.write_str("remaining"),
        }
    }
}

/// A half-open page range `[start, end)` with the settings used to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRange {
    pub tier: Tier,
    /// First page index (0-based, inclusive).
    pub start: usize,
    /// One past the last page index.
    pub end: usize,
    pub dpi: u32,
    pub quality: u8,
}

impl TierRange {
    /// Number of pages covered.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The page indices as a standard range.
    pub fn pages(&self) -> Range<usize> {
        self.start..self.end.max(self.start)
    }
}

/// Outcome of a run that did not hit a fatal error.
///
/// `success == false` means the output file is complete and valid but still
/// larger than the configured target after the extreme pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionResult {
    /// Whether the final output is at or below the target size.
    pub success: bool,
    /// Final output size in binary megabytes.
    pub final_size_mb: f64,
    pub stats: CompressionStats,
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompressionStats {
    /// Pages in the input document.
    pub total_pages: usize,
    /// Pages rendered by the important tier.
    pub important_pages: usize,
    /// Pages rendered by the remaining tier.
    pub remaining_pages: usize,
    /// Images actually packed into the output (may be fewer than pages).
    pub images_assembled: usize,
    /// Output size after the first assembly.
    pub first_pass_size_mb: f64,
    /// Whether the extreme pass ran.
    pub extreme_pass: bool,
    /// Time spent rasterising both tiers.
    pub raster_duration_ms: u64,
    /// Wall-clock duration of the whole run.
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_range_len_and_pages() {
        let r = TierRange {
            tier: Tier::Remaining,
            start: 5,
            end: 10,
            dpi: 35,
            quality: 25,
        };
        assert_eq!(r.len(), 5);
        assert_eq!(r.pages().collect::<Vec<_>>(), vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn inverted_range_is_empty() {
        let r = TierRange {
            tier: Tier::Remaining,
            start: 8,
            end: 3,
            dpi: 35,
            quality: 25,
        };
        assert!(r.is_empty());
        assert_eq!(r.pages().count(), 0);
    }

    #[test]
    fn result_serialises_to_json() {
        let result = CompressionResult {
            success: false,
            final_size_mb: 5.25,
            stats: CompressionStats {
                extreme_pass: true,
                ..Default::default()
            },
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"extreme_pass\":true"));
        assert_eq!(Tier::Important.to_string(), "important");
    }
}
