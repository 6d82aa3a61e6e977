//! Comment data structures

/// Default comment color (white)
const DEFAULT_COLOR: u32 = 0xFF_FF_FF;

/// How a comment moves across the video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CommentMode {
    /// Scrolls from right to left
    Rtl,
    /// Scrolls from left to right
    Ltr,
    /// Pinned to the top lanes
    Top,
    /// Pinned to the bottom lanes
    Bottom,
}

/// The fixed-position subset of [`CommentMode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FixedMode {
    Top,
    Bottom,
}

impl CommentMode {
    /// Maps a mode code from the `p` attribute string.
    ///
    /// Unknown codes fall back to right-to-left scrolling.
    pub fn from_code(code: u32) -> Self {
        match code {
            4 => Self::Bottom,
            5 => Self::Top,
            6 => Self::Ltr,
            _ => Self::Rtl,
        }
    }

    /// Returns the fixed lane group for `top`/`bottom` comments
    pub fn fixed(self) -> Option<FixedMode> {
        match self {
            Self::Top => Some(FixedMode::Top),
            Self::Bottom => Some(FixedMode::Bottom),
            Self::Rtl | Self::Ltr => None,
        }
    }
}

impl From<FixedMode> for CommentMode {
    fn from(mode: FixedMode) -> Self {
        match mode {
            FixedMode::Top => Self::Top,
            FixedMode::Bottom => Self::Bottom,
        }
    }
}

/// A comment ready for playback
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParsedComment {
    /// Position on the danmaku timeline in seconds
    pub time: f64,
    pub mode: CommentMode,
    /// RGB color
    pub color: u32,
    pub text: String,
}

impl ParsedComment {
    /// Creates a new comment with the default color
    pub fn new(time: f64, mode: CommentMode, text: impl Into<String>) -> Self {
        Self {
            time,
            mode,
            color: DEFAULT_COLOR,
            text: text.into(),
        }
    }

    /// Returns a copy of this comment with another mode
    pub fn with_mode(&self, mode: CommentMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }
}

/// A stored comment record.
///
/// `p` is the comma separated attribute string `time,mode,color,...` and `m`
/// the comment text.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommentEntity {
    pub p: String,
    pub m: String,
}

impl CommentEntity {
    /// Creates a new entity
    pub fn new(p: impl Into<String>, m: impl Into<String>) -> Self {
        Self {
            p: p.into(),
            m: m.into(),
        }
    }

    fn field(&self, index: usize) -> Option<&str> {
        self.p.split(',').nth(index).map(str::trim)
    }

    /// Time in seconds, `None` when missing, unparsable or non-finite
    pub fn time(&self) -> Option<f64> {
        self.field(0)?
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite())
    }

    pub fn mode(&self) -> CommentMode {
        self.field(1)
            .and_then(|f| f.parse::<u32>().ok())
            .map_or(CommentMode::Rtl, CommentMode::from_code)
    }

    pub fn color(&self) -> u32 {
        self.field(2)
            .and_then(|f| f.parse::<u32>().ok())
            .unwrap_or(DEFAULT_COLOR)
    }

    /// Converts to a [`ParsedComment`], dropping entities without a usable time
    pub fn to_parsed(&self) -> Option<ParsedComment> {
        Some(ParsedComment {
            time: self.time()?,
            mode: self.mode(),
            color: self.color(),
            text: self.m.clone(),
        })
    }
}

/// Parses entities into comments sorted ascending by time.
///
/// Entities whose time cannot be parsed are skipped. Comments sharing a time
/// keep their input order.
pub fn parse_comments(entities: &[CommentEntity]) -> Vec<ParsedComment> {
    let mut comments: Vec<ParsedComment> =
        entities.iter().filter_map(CommentEntity::to_parsed).collect();
    comments.sort_by(|a, b| a.time.total_cmp(&b.time));
    comments
}
