//! Skip gaps and the video-time to danmaku-time mapping
//!
//! A gap removes a stretch of video (a recap, an intro) from the danmaku
//! timeline. While playback is inside a gap nothing is emitted, and every
//! position after it is shifted back by the gap's duration.
//!
//! For a single gap from 60s to 120s:
//! - video 50s maps to 50s
//! - video 90s maps to 60s (clamped to the gap start)
//! - video 150s maps to 90s
//!
//! Overlapping gaps are not merged: each enabled gap subtracts its own
//! contribution, so overlapping regions are subtracted more than once.

use crate::{Error, Result};

/// A configured skip region on the video timeline
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DanmakuGap {
    /// Start time in seconds (inclusive)
    pub start: f64,
    /// End time in seconds (exclusive)
    pub end: f64,
    #[cfg_attr(feature = "serde", serde(default = "enabled_by_default"))]
    pub enabled: bool,
}

#[cfg(feature = "serde")]
fn enabled_by_default() -> bool {
    true
}

impl DanmakuGap {
    /// Creates a new enabled gap
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            enabled: true,
        }
    }

    /// Returns a disabled copy of this gap
    pub fn disabled(self) -> Self {
        Self {
            enabled: false,
            ..self
        }
    }

    /// Checks if `time` falls inside `[start, end)`
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    /// Returns the duration in seconds, zero for inverted gaps
    pub fn duration(&self) -> f64 {
        if self.is_well_formed() {
            self.end - self.start
        } else {
            0.0
        }
    }

    fn is_well_formed(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start <= self.end
    }

    /// Rejects gaps with non-finite bounds or `start > end`
    pub fn validate(&self) -> Result<()> {
        if self.is_well_formed() {
            Ok(())
        } else {
            Err(Error::InvalidGap {
                start: self.start,
                end: self.end,
            })
        }
    }

    /// How much of this gap lies before `video_time`
    fn elapsed_at(&self, video_time: f64) -> f64 {
        if !self.enabled || !self.is_well_formed() {
            0.0
        } else if video_time >= self.end {
            self.end - self.start
        } else if video_time >= self.start {
            video_time - self.start
        } else {
            0.0
        }
    }
}

/// Maps a video time onto the danmaku timeline by collapsing enabled gaps.
///
/// Inverted gaps subtract nothing.
pub fn effective_time(video_time: f64, gaps: &[DanmakuGap]) -> f64 {
    gaps.iter()
        .fold(video_time, |time, gap| time - gap.elapsed_at(video_time))
}

/// Checks if `time` is inside any enabled gap
pub fn is_inside_gap(time: f64, gaps: &[DanmakuGap]) -> bool {
    gaps.iter().any(|gap| gap.enabled && gap.contains(time))
}

/// Returns the indices of the first pair of enabled gaps that overlap
pub fn find_overlap(gaps: &[DanmakuGap]) -> Option<(usize, usize)> {
    let enabled: Vec<(usize, &DanmakuGap)> = gaps
        .iter()
        .enumerate()
        .filter(|(_, g)| g.enabled && g.is_well_formed() && g.start < g.end)
        .collect();

    enabled.iter().enumerate().find_map(|(n, (i, a))| {
        enabled[n + 1..]
            .iter()
            .find(|(_, b)| a.start < b.end && b.start < a.end)
            .map(|(j, _)| (*i, *j))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_time_single_gap() {
        let gaps = [DanmakuGap::new(60.0, 120.0)];
        assert_eq!(effective_time(50.0, &gaps), 50.0);
        assert_eq!(effective_time(90.0, &gaps), 60.0);
        assert_eq!(effective_time(120.0, &gaps), 60.0);
        assert_eq!(effective_time(150.0, &gaps), 90.0);
    }

    #[test]
    fn test_effective_time_multiple_gaps() {
        let gaps = [DanmakuGap::new(10.0, 20.0), DanmakuGap::new(30.0, 35.0)];
        assert_eq!(effective_time(25.0, &gaps), 15.0);
        assert_eq!(effective_time(32.0, &gaps), 20.0);
        assert_eq!(effective_time(40.0, &gaps), 25.0);
    }

    #[test]
    fn test_overlapping_gaps_stack() {
        let gaps = [DanmakuGap::new(10.0, 30.0), DanmakuGap::new(20.0, 40.0)];
        // 20s of the first gap plus 20s of the second
        assert_eq!(effective_time(50.0, &gaps), 10.0);
        assert_eq!(find_overlap(&gaps), Some((0, 1)));
    }

    #[test]
    fn test_disabled_gaps_are_ignored() {
        let gaps = [DanmakuGap::new(10.0, 20.0).disabled()];
        assert_eq!(effective_time(30.0, &gaps), 30.0);
        assert!(!is_inside_gap(15.0, &gaps));
        assert_eq!(find_overlap(&[gaps[0], gaps[0]]), None);
    }

    #[test]
    fn test_inverted_gap_is_empty() {
        let gap = DanmakuGap::new(20.0, 10.0);
        assert_eq!(effective_time(30.0, &[gap]), 30.0);
        assert_eq!(effective_time(15.0, &[gap]), 15.0);
        assert!(!is_inside_gap(15.0, &[gap]));
        assert!(matches!(gap.validate(), Err(Error::InvalidGap { .. })));
        assert!(DanmakuGap::new(f64::NAN, 10.0).validate().is_err());
        assert!(DanmakuGap::new(5.0, 10.0).validate().is_ok());
    }

    #[test]
    fn test_is_inside_gap_half_open() {
        let gaps = [DanmakuGap::new(10.0, 20.0)];
        assert!(!is_inside_gap(9.999, &gaps));
        assert!(is_inside_gap(10.0, &gaps));
        assert!(is_inside_gap(19.999, &gaps));
        assert!(!is_inside_gap(20.0, &gaps));
    }

    #[test]
    fn test_effective_time_monotonic_without_overlap() {
        let gaps = [
            DanmakuGap::new(5.0, 12.5),
            DanmakuGap::new(40.0, 41.0),
            DanmakuGap::new(70.0, 100.0),
        ];
        let mut previous = f64::NEG_INFINITY;
        for step in 0..=1200 {
            let t = step as f64 * 0.1;
            let mapped = effective_time(t, &gaps);
            assert!(mapped >= previous, "not monotonic at {t}");
            previous = mapped;
        }
    }

    #[test]
    fn test_adjacent_gaps_do_not_overlap() {
        let gaps = [DanmakuGap::new(0.0, 10.0), DanmakuGap::new(10.0, 20.0)];
        assert_eq!(find_overlap(&gaps), None);
    }
}
