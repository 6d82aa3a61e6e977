//! Sorted comment timeline with a playback cursor

use crate::ParsedComment;

/// How long a comment is assumed to stay on screen, in seconds.
///
/// After a seek or resume, comments up to this far in the past are still
/// emitted with partial progress instead of being skipped.
pub const DEFAULT_LOOKBACK_SECS: f64 = 5.0;

/// Returns the first index whose time is `>= time`, or `comments.len()`.
///
/// `comments` must be sorted ascending by time.
pub fn lower_bound(comments: &[ParsedComment], time: f64) -> usize {
    comments.partition_point(|c| c.time < time)
}

/// Comments sorted by time plus the index of the next comment to emit
#[derive(Debug, Clone, Default)]
pub struct CommentTimeline {
    comments: Vec<ParsedComment>,
    cursor: usize,
}

impl CommentTimeline {
    /// Creates a timeline from comments already sorted by time.
    ///
    /// Comments whose time is not finite are dropped.
    pub fn new(mut comments: Vec<ParsedComment>) -> Self {
        comments.retain(|c| c.time.is_finite());
        Self {
            comments,
            cursor: 0,
        }
    }

    /// Index of the next comment to emit, in `[0, len]`
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn comments(&self) -> &[ParsedComment] {
        &self.comments
    }

    /// Checks if every comment has been passed
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.comments.len()
    }

    /// Moves the cursor to the first comment within `lookback` seconds of
    /// `effective_time`
    pub fn seek(&mut self, effective_time: f64, lookback: f64) -> usize {
        self.cursor = lower_bound(&self.comments, effective_time - lookback);
        self.cursor
    }

    /// Returns the comment under the cursor if it is due at `effective_time`
    pub fn next_due(&self, effective_time: f64) -> Option<&ParsedComment> {
        self.comments
            .get(self.cursor)
            .filter(|c| c.time <= effective_time)
    }

    /// Moves past the comment under the cursor
    pub fn advance(&mut self) {
        if self.cursor < self.comments.len() {
            self.cursor += 1;
        }
    }
}
