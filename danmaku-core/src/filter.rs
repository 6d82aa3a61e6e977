//! Comment text filters

use crate::{Error, Result};
use regex::Regex;
use tracing::warn;

/// How a filter value is matched against comment text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FilterKind {
    /// Substring containment
    Text,
    /// Unanchored regular expression match
    Regex,
}

/// A user-configured filter that hides matching comments
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DanmakuFilter {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: FilterKind,
    pub value: String,
    pub enabled: bool,
}

impl DanmakuFilter {
    /// Creates an enabled substring filter
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: FilterKind::Text,
            value: value.into(),
            enabled: true,
        }
    }

    /// Creates an enabled regex filter
    pub fn regex(value: impl Into<String>) -> Self {
        Self {
            kind: FilterKind::Regex,
            value: value.into(),
            enabled: true,
        }
    }

    /// Returns a disabled copy of this filter
    pub fn disabled(self) -> Self {
        Self {
            enabled: false,
            ..self
        }
    }

    /// Builds the matcher for this filter
    pub fn compile(&self) -> Result<Matcher> {
        match self.kind {
            FilterKind::Text => Ok(Matcher::Text(self.value.clone())),
            FilterKind::Regex => Regex::new(&self.value)
                .map(Matcher::Regex)
                .map_err(|source| Error::InvalidRegex {
                    pattern: self.value.clone(),
                    source,
                }),
        }
    }
}

/// A compiled filter
#[derive(Debug, Clone)]
pub enum Matcher {
    Text(String),
    Regex(Regex),
}

impl Matcher {
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Text(needle) => text.contains(needle.as_str()),
            Self::Regex(re) => re.is_match(text),
        }
    }
}

/// The enabled filters of a configuration, compiled once.
///
/// A regex that fails to compile never matches; a warning is logged and the
/// remaining filters still apply.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilters {
    matchers: Vec<Matcher>,
}

impl CompiledFilters {
    pub fn new(filters: &[DanmakuFilter]) -> Self {
        let matchers = filters
            .iter()
            .filter(|f| f.enabled)
            .filter_map(|f| match f.compile() {
                Ok(matcher) => Some(matcher),
                Err(e) => {
                    warn!("Ignoring filter: {}", e);
                    None
                }
            })
            .collect();

        Self { matchers }
    }

    /// Checks if any enabled filter matches `text`
    pub fn is_match(&self, text: &str) -> bool {
        self.matchers.iter().any(|m| m.is_match(text))
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
