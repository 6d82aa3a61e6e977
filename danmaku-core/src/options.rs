//! Live danmaku options

use crate::{find_overlap, DanmakuFilter, DanmakuGap, Error, FixedMode, Result};
use tracing::warn;

/// How `top`/`bottom` comments are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FixedCommentMode {
    /// Pinned in a fixed lane
    #[default]
    Normal,
    /// Re-labelled as right-to-left and scrolled
    Scroll,
}

/// Per-group display mode for fixed comments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SpecialComments {
    pub top: FixedCommentMode,
    pub bottom: FixedCommentMode,
}

impl SpecialComments {
    pub fn get(&self, mode: FixedMode) -> FixedCommentMode {
        match mode {
            FixedMode::Top => self.top,
            FixedMode::Bottom => self.bottom,
        }
    }
}

/// A named, reusable set of gaps
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GapPreset {
    pub id: String,
    pub name: String,
    pub gaps: Vec<DanmakuGap>,
}

/// Options read by the sync engine on every tick and by the density chart
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct DanmakuOptions {
    /// Shift applied to every comment, in milliseconds
    pub offset_ms: i64,
    pub gaps: Vec<DanmakuGap>,
    pub special_comments: SpecialComments,
    /// Show fixed comments even when their lanes are full
    pub allow_overlap: bool,
    pub filters: Vec<DanmakuFilter>,
    pub gap_presets: Vec<GapPreset>,
}

impl DanmakuOptions {
    /// Offset in seconds
    pub fn offset_secs(&self) -> f64 {
        self.offset_ms as f64 / 1000.0
    }

    /// Replaces the active gaps with those of the preset `id`
    pub fn apply_preset(&mut self, id: &str) -> Result<()> {
        let preset = self
            .gap_presets
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::PresetNotFound(id.to_string()))?;
        self.gaps = preset.gaps.clone();
        Ok(())
    }

    /// Rejects malformed gaps and warns about overlapping ones
    pub fn validate(&self) -> Result<()> {
        for gap in &self.gaps {
            gap.validate()?;
        }

        if let Some((a, b)) = find_overlap(&self.gaps) {
            warn!(
                "Gaps {} and {} overlap; their durations are subtracted twice",
                a, b
            );
        }

        Ok(())
    }

    /// Reads options from JSON
    #[cfg(feature = "serde")]
    pub fn from_json_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Loads and validates options from a JSON file
    #[cfg(feature = "serde")]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let options = Self::from_json_reader(std::io::BufReader::new(file))?;
        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_presets() -> DanmakuOptions {
        DanmakuOptions {
            gaps: vec![DanmakuGap::new(1.0, 2.0)],
            gap_presets: vec![GapPreset {
                id: "op".to_string(),
                name: "Opening".to_string(),
                gaps: vec![DanmakuGap::new(0.0, 90.0)],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_preset() {
        let mut options = with_presets();
        options.apply_preset("op").unwrap();
        assert_eq!(options.gaps, vec![DanmakuGap::new(0.0, 90.0)]);
    }

    #[test]
    fn test_apply_missing_preset() {
        let mut options = with_presets();
        assert!(matches!(
            options.apply_preset("ed"),
            Err(Error::PresetNotFound(_))
        ));
        assert_eq!(options.gaps, vec![DanmakuGap::new(1.0, 2.0)]);
    }

    #[test]
    fn test_validate_rejects_inverted_gap() {
        let options = DanmakuOptions {
            gaps: vec![DanmakuGap::new(30.0, 10.0)],
            ..Default::default()
        };
        assert!(options.validate().is_err());
        assert!(with_presets().validate().is_ok());
    }

    #[test]
    fn test_offset_secs() {
        let options = DanmakuOptions {
            offset_ms: -1500,
            ..Default::default()
        };
        assert_eq!(options.offset_secs(), -1.5);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json() {
        let json = r#"{
            "offsetMs": 2000,
            "gaps": [{ "start": 10, "end": 20 }],
            "specialComments": { "top": "scroll" },
            "filters": [{ "type": "regex", "value": "^a", "enabled": true }]
        }"#;
        let options = DanmakuOptions::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(options.offset_ms, 2000);
        assert!(options.gaps[0].enabled);
        assert_eq!(options.special_comments.top, FixedCommentMode::Scroll);
        assert_eq!(options.special_comments.bottom, FixedCommentMode::Normal);
        assert!(!options.allow_overlap);
        assert_eq!(options.filters[0].kind, crate::FilterKind::Regex);
    }
}
