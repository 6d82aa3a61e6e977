//! Danmaku Core Library
//!
//! This library provides the data structures and pure time mapping shared by
//! the playback sync engine and the density histogram: parsed comments, skip
//! gaps, comment filters, the sorted comment timeline and the live options.

pub mod comment;
pub mod filter;
pub mod gap;
pub mod options;
pub mod timeline;

pub use comment::{parse_comments, CommentEntity, CommentMode, FixedMode, ParsedComment};
pub use filter::{CompiledFilters, DanmakuFilter, FilterKind, Matcher};
pub use gap::{effective_time, find_overlap, is_inside_gap, DanmakuGap};
pub use options::{DanmakuOptions, FixedCommentMode, GapPreset, SpecialComments};
pub use timeline::{lower_bound, CommentTimeline, DEFAULT_LOOKBACK_SECS};

/// Result type for danmaku-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for danmaku-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid gap: start {start}s, end {end}s")]
    InvalidGap { start: f64, end: f64 },

    #[error("Invalid regex filter '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Gap preset not found: {0}")]
    PresetNotFound(String),
}
