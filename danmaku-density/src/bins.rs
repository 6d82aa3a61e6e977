//! Histogram binning

use crate::DensityOptions;
use danmaku_core::{is_inside_gap, CommentEntity, CompiledFilters};
use tracing::{debug, warn};

/// Default bin width in seconds
pub const DEFAULT_BIN_WIDTH_SECS: f64 = 10.0;

/// Most bins a single chart may have
pub const MAX_BIN_COUNT: usize = 100_000;

/// One bar of the density chart
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DensityPoint {
    /// Bin center in seconds, capped at the video duration
    pub time: f64,
    /// Comment count relative to the busiest bin, in `[0, 1]`
    pub value: f64,
}

/// Counts comments per `bin_width`-second bin over `[0, duration]` and
/// normalizes by the busiest bin.
///
/// Returns no bins for a non-finite or non-positive duration, or when the
/// chart would need more than [`MAX_BIN_COUNT`] bins. `bin_width` is raised
/// to at least one second. Comments are skipped when an enabled
/// filter matches their text, when their time is unparsable, or when the
/// shifted time falls outside the video or inside an enabled gap.
pub fn compute_density_bins(
    comments: &[CommentEntity],
    duration: f64,
    bin_width: f64,
    options: &DensityOptions,
) -> Vec<DensityPoint> {
    if !duration.is_finite() || duration <= 0.0 {
        return Vec::new();
    }

    let bin_width = bin_width.max(1.0);
    let bins = (duration / bin_width).ceil();
    if bins > MAX_BIN_COUNT as f64 {
        warn!(
            "{}s at {}s per bin needs {} bins, over the limit of {}",
            duration, bin_width, bins, MAX_BIN_COUNT
        );
        return Vec::new();
    }
    let bin_count = (bins as usize).max(1);
    let mut counts = vec![0u32; bin_count];

    let filters = CompiledFilters::new(&options.filters);
    let offset_secs = options.offset_ms as f64 / 1000.0;

    for comment in comments {
        if filters.is_match(&comment.m) {
            continue;
        }

        let Some(time) = comment.time() else {
            continue;
        };
        let t = time + offset_secs;
        if !t.is_finite() || t < 0.0 || t > duration {
            continue;
        }

        if is_inside_gap(t, &options.gaps) {
            continue;
        }

        let index = ((t / bin_width).floor() as usize).min(bin_count - 1);
        counts[index] += 1;
    }

    let counted: u32 = counts.iter().sum();
    let max_count = counts.iter().copied().max().unwrap_or(0).max(1);
    debug!(
        "Binned {} of {} comments into {} bins of {}s",
        counted,
        comments.len(),
        bin_count,
        bin_width
    );

    counts
        .iter()
        .enumerate()
        .map(|(i, &count)| DensityPoint {
            time: (i as f64 * bin_width + bin_width / 2.0).min(duration),
            value: count as f64 / max_count as f64,
        })
        .collect()
}
