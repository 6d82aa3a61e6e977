//! Danmaku Density Library
//!
//! This library reduces a comment stream into a normalized per-bin histogram
//! for the overview chart above the seek bar. Offset, filters and gaps are
//! applied the same way the playback engine applies them.

pub mod bins;

pub use bins::{compute_density_bins, DensityPoint, DEFAULT_BIN_WIDTH_SECS, MAX_BIN_COUNT};

use danmaku_core::{DanmakuFilter, DanmakuGap, DanmakuOptions};

/// Density configuration
#[derive(Debug, Clone, Default)]
pub struct DensityOptions {
    /// Shift applied to every comment, in milliseconds
    pub offset_ms: i64,
    /// Comments matching an enabled filter are not counted
    pub filters: Vec<DanmakuFilter>,
    /// Comments inside an enabled gap are not counted
    pub gaps: Vec<DanmakuGap>,
}

impl From<&DanmakuOptions> for DensityOptions {
    fn from(options: &DanmakuOptions) -> Self {
        Self {
            offset_ms: options.offset_ms,
            filters: options.filters.clone(),
            gaps: options.gaps.clone(),
        }
    }
}
