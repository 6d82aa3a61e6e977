//! Playback sync engine
//!
//! Maps the media position onto the danmaku timeline and emits every comment
//! the cursor passes. The engine reacts to discrete events:
//!
//! | Event | Effect |
//! |---|---|
//! | position advanced | emit due comments |
//! | seek | clear the renderer, re-seed the cursor, emit |
//! | paused / stalled | freeze the renderer and stop its clock |
//! | resumed | unfreeze, restart the clock, emit |
//! | hidden | keep advancing the cursor but emit nothing |
//! | offset changed | re-seed the cursor and clear the renderer |

use crate::collab::{
    ConfigProvider, FixedOptions, MediaEvent, PriorityOptions, Renderer, ScrollDirection,
    Visibility,
};
use danmaku_core::{
    effective_time, is_inside_gap, CommentMode, CommentTimeline, DanmakuOptions, FixedCommentMode,
    FixedMode, ParsedComment, DEFAULT_LOOKBACK_SECS,
};
use tracing::{debug, trace, warn};

/// Progress below this is treated as a fresh comment
pub const PROGRESS_SNAP_THRESHOLD: f64 = 0.1;

/// Drives a [`Renderer`] from playback events
pub struct PlaybackSyncEngine<R, C> {
    timeline: CommentTimeline,
    config: C,
    renderer: R,
    /// Offset the cursor was last seeded with
    offset_ms: i64,
    /// Seconds a comment stays on screen
    lookback: f64,
    document_visible: bool,
}

impl<R: Renderer, C: ConfigProvider> PlaybackSyncEngine<R, C> {
    /// Creates an engine over `comments`, which must be sorted by time.
    ///
    /// The cursor starts at zero; call [`reset_cursor`](Self::reset_cursor)
    /// with the current position before the first event.
    pub fn new(comments: Vec<ParsedComment>, config: C, renderer: R) -> Self {
        let offset_ms = config.options().offset_ms;
        Self {
            timeline: CommentTimeline::new(comments),
            config,
            renderer,
            offset_ms,
            lookback: DEFAULT_LOOKBACK_SECS,
            document_visible: true,
        }
    }

    /// Sets the on-screen duration used for lookback and progress
    pub fn with_lookback(mut self, secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            self.lookback = secs;
        } else {
            warn!(
                "Ignoring lookback of {}s, keeping {}s",
                secs, self.lookback
            );
        }
        self
    }

    pub fn cursor(&self) -> usize {
        self.timeline.cursor()
    }

    pub fn timeline(&self) -> &CommentTimeline {
        &self.timeline
    }

    pub fn lookback(&self) -> f64 {
        self.lookback
    }

    pub fn offset_secs(&self) -> f64 {
        self.offset_ms as f64 / 1000.0
    }

    pub fn is_document_visible(&self) -> bool {
        self.document_visible
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Handles a media event at playback `position` (seconds)
    pub fn handle(&mut self, event: MediaEvent, position: f64) {
        match event {
            MediaEvent::PositionAdvanced => {
                self.tick(position);
            }
            MediaEvent::Seek => self.seek(position),
            MediaEvent::Paused | MediaEvent::Stalled => self.pause(),
            MediaEvent::Resumed | MediaEvent::ResumedAfterStall => self.resume(position),
        }
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.document_visible = visibility == Visibility::Visible;
        debug!("Document visible: {}", self.document_visible);
    }

    /// Seeds the cursor so comments up to one lookback in the past are
    /// emitted again with partial progress
    pub fn reset_cursor(&mut self, position: f64) -> usize {
        let options = self.config.options();
        let effective = effective_time(position - self.offset_secs(), &options.gaps);
        let cursor = self.timeline.seek(effective, self.lookback);
        debug!(
            "Cursor reset to {} / {} (position {:.3}s, effective {:.3}s)",
            cursor,
            self.timeline.len(),
            position,
            effective
        );
        cursor
    }

    /// Re-reads the offset; a change re-seeds the cursor and clears the
    /// renderer. Returns whether a reset happened.
    pub fn update_options(&mut self, position: f64) -> bool {
        let offset_ms = self.config.options().offset_ms;
        if offset_ms == self.offset_ms {
            return false;
        }

        debug!("Offset changed from {}ms to {}ms", self.offset_ms, offset_ms);
        self.offset_ms = offset_ms;
        self.reset_cursor(position);
        self.renderer.clear();
        true
    }

    /// Emits every comment due at `position`. Returns how many comments the
    /// cursor passed, including ones not shown while hidden.
    pub fn tick(&mut self, position: f64) -> usize {
        let options = self.config.options();
        let offset_time = position - self.offset_secs();

        if is_inside_gap(offset_time, &options.gaps) {
            return 0;
        }

        let effective = effective_time(offset_time, &options.gaps);
        if effective < 0.0 {
            return 0;
        }
        let start = self.timeline.cursor();

        while let Some(comment) = self.timeline.next_due(effective) {
            let mut progress = ((effective - comment.time) / self.lookback).min(1.0);
            if progress < PROGRESS_SNAP_THRESHOLD {
                progress = 0.0;
            }

            if self.document_visible {
                emit(&mut self.renderer, comment, progress, &options, self.lookback);
            }

            self.timeline.advance();
        }

        self.timeline.cursor() - start
    }

    fn seek(&mut self, position: f64) {
        self.renderer.clear();
        self.reset_cursor(position);
        self.tick(position);
    }

    fn pause(&mut self) {
        self.renderer.freeze();
        self.renderer.stop_clock();
    }

    fn resume(&mut self, position: f64) {
        if self.renderer.is_frozen() {
            self.renderer.unfreeze();
        }
        self.renderer.start_clock();
        self.tick(position);
    }
}

/// Routes a due comment to the renderer by mode.
///
/// Scrolling comments always go to the front of the priority queue. Fixed
/// comments are dropped while the renderer is frozen and otherwise follow
/// the configured special-comment mode.
fn emit<R: Renderer>(
    renderer: &mut R,
    comment: &ParsedComment,
    progress: f64,
    options: &DanmakuOptions,
    lookback: f64,
) {
    trace!(
        "Emitting {:?} comment at {:.3}s, progress {:.2}",
        comment.mode,
        comment.time,
        progress
    );

    let fixed = match comment.mode {
        CommentMode::Rtl => {
            let direction = ScrollDirection::Left;
            renderer.insert_priority(comment, PriorityOptions { progress, direction });
            return;
        }
        CommentMode::Ltr => {
            let direction = ScrollDirection::Right;
            renderer.insert_priority(comment, PriorityOptions { progress, direction });
            return;
        }
        CommentMode::Top => FixedMode::Top,
        CommentMode::Bottom => FixedMode::Bottom,
    };

    if renderer.is_frozen() {
        return;
    }

    match options.special_comments.get(fixed) {
        FixedCommentMode::Normal => {
            if options.allow_overlap || !renderer.is_lane_full(fixed) {
                renderer.insert_fixed(
                    comment,
                    FixedOptions {
                        mode: fixed,
                        duration_secs: lookback,
                    },
                );
            }
        }
        FixedCommentMode::Scroll => {
            let scrolled = comment.with_mode(CommentMode::Rtl);
            renderer.insert_priority(
                &scrolled,
                PriorityOptions {
                    progress,
                    direction: ScrollDirection::Left,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::SharedOptions;
    use danmaku_core::{lower_bound, DanmakuGap, SpecialComments};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Priority(String, CommentMode, f64, ScrollDirection),
        Fixed(String, FixedMode),
        Freeze,
        Unfreeze,
        Clear,
        StartClock,
        StopClock,
    }

    #[derive(Default)]
    struct FakeRenderer {
        calls: Vec<Call>,
        frozen: bool,
        full: Vec<FixedMode>,
    }

    impl FakeRenderer {
        fn emitted(&self) -> Vec<String> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Priority(text, ..) | Call::Fixed(text, _) => Some(text.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl Renderer for FakeRenderer {
        fn insert_priority(&mut self, comment: &ParsedComment, options: PriorityOptions) {
            self.calls.push(Call::Priority(
                comment.text.clone(),
                comment.mode,
                options.progress,
                options.direction,
            ));
        }

        fn insert_fixed(&mut self, comment: &ParsedComment, options: FixedOptions) {
            self.calls.push(Call::Fixed(comment.text.clone(), options.mode));
        }

        fn is_lane_full(&self, mode: FixedMode) -> bool {
            self.full.contains(&mode)
        }

        fn is_frozen(&self) -> bool {
            self.frozen
        }

        fn freeze(&mut self) {
            self.frozen = true;
            self.calls.push(Call::Freeze);
        }

        fn unfreeze(&mut self) {
            self.frozen = false;
            self.calls.push(Call::Unfreeze);
        }

        fn clear(&mut self) {
            self.calls.push(Call::Clear);
        }

        fn start_clock(&mut self) {
            self.calls.push(Call::StartClock);
        }

        fn stop_clock(&mut self) {
            self.calls.push(Call::StopClock);
        }
    }

    fn rtl(times: &[f64]) -> Vec<ParsedComment> {
        times
            .iter()
            .map(|&t| ParsedComment::new(t, CommentMode::Rtl, format!("{t}")))
            .collect()
    }

    fn engine(
        comments: Vec<ParsedComment>,
        options: DanmakuOptions,
    ) -> (PlaybackSyncEngine<FakeRenderer, SharedOptions>, SharedOptions) {
        let shared = SharedOptions::new(options);
        let engine = PlaybackSyncEngine::new(comments, shared.clone(), FakeRenderer::default());
        (engine, shared)
    }

    #[test]
    fn test_tick_emits_due_comments_in_order() {
        let (mut engine, _) = engine(rtl(&[1.0, 2.0, 3.0, 10.0]), DanmakuOptions::default());

        assert_eq!(engine.tick(0.5), 0);
        assert_eq!(engine.tick(2.0), 2);
        assert_eq!(engine.tick(3.5), 1);
        assert_eq!(engine.cursor(), 3);
        assert_eq!(engine.renderer().emitted(), ["1", "2", "3"]);
    }

    #[test]
    fn test_progress_is_snapped_near_zero() {
        let (mut engine, _) = engine(rtl(&[1.0, 4.0]), DanmakuOptions::default());
        engine.tick(4.2);

        let progress: Vec<f64> = engine
            .renderer()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Priority(_, _, p, _) => Some(*p),
                _ => None,
            })
            .collect();
        // 3.2s late is 0.64 of the lookback, 0.2s late is under the snap
        assert!((progress[0] - 0.64).abs() < 1e-9);
        assert_eq!(progress[1], 0.0);
    }

    #[test]
    fn test_seek_matches_lower_bound_with_lookback() {
        let comments = rtl(&[1.0, 5.0, 12.0, 14.0, 20.0, 31.0, 40.0]);
        let gaps = vec![DanmakuGap::new(15.0, 25.0)];
        let options = DanmakuOptions {
            gaps: gaps.clone(),
            offset_ms: 1000,
            ..Default::default()
        };
        let (mut engine, _) = engine(comments.clone(), options);

        engine.tick(100.0);
        engine.handle(MediaEvent::Seek, 36.0);

        let expected = lower_bound(
            &comments,
            effective_time(36.0 - 1.0, &gaps) - DEFAULT_LOOKBACK_SECS,
        );
        // effective 25s: comments from 20s are replayed, 31s is not yet due
        assert_eq!(expected, 4);
        assert_eq!(engine.cursor(), 5);
        assert_eq!(engine.renderer().calls.iter().filter(|c| **c == Call::Clear).count(), 1);
        assert_eq!(engine.renderer().emitted().last().map(String::as_str), Some("20"));

        // effective 39s: the lookback window holds nothing, so nothing is replayed
        engine.handle(MediaEvent::Seek, 50.0);
        let expected = lower_bound(
            &comments,
            effective_time(50.0 - 1.0, &gaps) - DEFAULT_LOOKBACK_SECS,
        );
        assert_eq!(engine.cursor(), expected);
        assert_eq!(expected, 6);
    }

    #[test]
    fn test_seek_backwards_replays() {
        let (mut engine, _) = engine(rtl(&[1.0, 2.0, 30.0]), DanmakuOptions::default());
        engine.tick(31.0);
        assert_eq!(engine.cursor(), 3);

        engine.handle(MediaEvent::Seek, 2.0);
        assert_eq!(engine.cursor(), 2);
        assert_eq!(engine.renderer().emitted(), ["1", "2", "30", "1", "2"]);
    }

    #[test]
    fn test_inside_gap_suppresses_emission() {
        let options = DanmakuOptions {
            gaps: vec![DanmakuGap::new(10.0, 20.0)],
            ..Default::default()
        };
        let (mut engine, _) = engine(rtl(&[5.0, 10.0, 12.0]), options);

        assert_eq!(engine.tick(15.0), 0);
        assert_eq!(engine.cursor(), 0);

        // 22s of video is 12s of danmaku time
        assert_eq!(engine.tick(22.0), 3);
    }

    #[test]
    fn test_hidden_document_drops_comments() {
        let (mut engine, _) = engine(rtl(&[1.0, 2.0, 3.0]), DanmakuOptions::default());

        engine.set_visibility(Visibility::Hidden);
        assert_eq!(engine.tick(2.0), 2);
        assert!(engine.renderer().emitted().is_empty());

        engine.set_visibility(Visibility::Visible);
        engine.tick(3.0);
        assert_eq!(engine.renderer().emitted(), ["3"]);
    }

    #[test]
    fn test_pause_and_resume() {
        let comments = vec![
            ParsedComment::new(1.0, CommentMode::Top, "top"),
            ParsedComment::new(1.5, CommentMode::Rtl, "rtl"),
        ];
        let (mut engine, _) = engine(comments, DanmakuOptions::default());

        engine.handle(MediaEvent::Stalled, 0.0);
        assert!(engine.renderer().is_frozen());
        assert_eq!(engine.cursor(), 0);

        engine.handle(MediaEvent::ResumedAfterStall, 2.0);
        assert!(!engine.renderer().is_frozen());
        assert_eq!(
            engine.renderer().calls[..4],
            [Call::Freeze, Call::StopClock, Call::Unfreeze, Call::StartClock]
        );
        assert_eq!(engine.renderer().emitted(), ["top", "rtl"]);
    }

    #[test]
    fn test_resume_without_freeze_skips_unfreeze() {
        let (mut engine, _) = engine(Vec::new(), DanmakuOptions::default());
        engine.handle(MediaEvent::Resumed, 0.0);
        assert_eq!(engine.renderer().calls, [Call::StartClock]);
    }

    #[test]
    fn test_frozen_renderer_drops_fixed_but_not_scrolling() {
        let comments = vec![
            ParsedComment::new(1.0, CommentMode::Bottom, "bottom"),
            ParsedComment::new(1.0, CommentMode::Ltr, "ltr"),
        ];
        let (mut engine, _) = engine(comments, DanmakuOptions::default());
        engine.handle(MediaEvent::Paused, 0.0);
        engine.tick(1.0);

        assert_eq!(engine.renderer().emitted(), ["ltr"]);
        assert!(engine.renderer().calls.contains(&Call::Priority(
            "ltr".to_string(),
            CommentMode::Ltr,
            0.0,
            ScrollDirection::Right
        )));
        assert_eq!(engine.cursor(), 2);
    }

    #[test]
    fn test_fixed_comment_routing() {
        let comments = vec![
            ParsedComment::new(1.0, CommentMode::Top, "top"),
            ParsedComment::new(2.0, CommentMode::Bottom, "bottom"),
        ];
        let options = DanmakuOptions {
            special_comments: SpecialComments {
                top: FixedCommentMode::Scroll,
                bottom: FixedCommentMode::Normal,
            },
            ..Default::default()
        };
        let (mut engine, _) = engine(comments, options);
        engine.tick(2.0);

        assert_eq!(
            engine.renderer().calls,
            [
                Call::Priority("top".to_string(), CommentMode::Rtl, 0.2, ScrollDirection::Left),
                Call::Fixed("bottom".to_string(), FixedMode::Bottom),
            ]
        );
    }

    #[test]
    fn test_full_lanes_respect_allow_overlap() {
        let comments = vec![
            ParsedComment::new(1.0, CommentMode::Top, "a"),
            ParsedComment::new(2.0, CommentMode::Top, "b"),
        ];
        let (mut engine, shared) = engine(comments, DanmakuOptions::default());
        engine.renderer_mut().full.push(FixedMode::Top);

        engine.tick(1.0);
        assert!(engine.renderer().emitted().is_empty());
        assert_eq!(engine.cursor(), 1);

        shared.update(|o| o.allow_overlap = true);
        engine.tick(2.0);
        assert_eq!(engine.renderer().emitted(), ["b"]);
    }

    #[test]
    fn test_offset_change_resets_cursor() {
        let (mut engine, shared) = engine(rtl(&[1.0, 8.0, 9.0, 20.0]), DanmakuOptions::default());
        engine.tick(10.0);
        assert_eq!(engine.cursor(), 3);

        assert!(!engine.update_options(10.0));

        shared.update(|o| o.offset_ms = 4000);
        assert!(engine.update_options(10.0));
        assert_eq!(engine.offset_secs(), 4.0);
        // effective 6s, lookback reaches back to 1s
        assert_eq!(engine.cursor(), 0);
        assert_eq!(engine.renderer().calls.last(), Some(&Call::Clear));
    }

    #[test]
    fn test_other_option_changes_apply_without_reset() {
        let (mut engine, shared) = engine(rtl(&[1.0, 12.0]), DanmakuOptions::default());
        engine.tick(2.0);

        shared.update(|o| o.gaps.push(DanmakuGap::new(5.0, 10.0)));
        assert!(!engine.update_options(2.0));
        assert_eq!(engine.cursor(), 1);

        // 16s of video is 11s of danmaku time with the new gap
        assert_eq!(engine.tick(16.0), 0);
        assert_eq!(engine.tick(17.0), 1);
    }

    #[test]
    fn test_negative_offset_shows_comments_earlier() {
        let options = DanmakuOptions {
            offset_ms: -2000,
            ..Default::default()
        };
        let (mut engine, _) = engine(rtl(&[3.0]), options);
        assert_eq!(engine.tick(0.5), 0);
        assert_eq!(engine.tick(1.0), 1);
    }

    #[test]
    fn test_invalid_lookback_is_ignored() {
        let (engine, _) = engine(Vec::new(), DanmakuOptions::default());
        let engine = engine.with_lookback(-1.0).with_lookback(f64::NAN);
        assert_eq!(engine.lookback(), DEFAULT_LOOKBACK_SECS);
        assert_eq!(engine.with_lookback(8.0).lookback(), 8.0);
    }

    #[test]
    fn test_non_finite_comment_does_not_stall_cursor() {
        let (mut engine, _) = engine(rtl(&[1.0, f64::NAN, 3.0, 4.0]), DanmakuOptions::default());

        assert_eq!(engine.tick(100.0), 3);
        assert!(engine.timeline().is_exhausted());
        assert_eq!(engine.renderer().emitted(), ["1", "3", "4"]);
    }

    #[test]
    fn test_progress_is_capped_at_one() {
        let (mut engine, _) = engine(rtl(&[1.0, 18.0]), DanmakuOptions::default());
        engine.tick(20.0);

        let progress: Vec<f64> = engine
            .renderer()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Priority(_, _, p, _) => Some(*p),
                _ => None,
            })
            .collect();
        // 19s late is past the whole lookback
        assert_eq!(progress[0], 1.0);
        assert!((progress[1] - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_negative_effective_time_emits_nothing() {
        let options = DanmakuOptions {
            offset_ms: 2000,
            ..Default::default()
        };
        let (mut engine, _) = engine(rtl(&[-1.0, 0.5]), options);

        assert_eq!(engine.tick(1.5), 0);
        assert_eq!(engine.cursor(), 0);
        assert_eq!(engine.tick(2.5), 2);
        assert_eq!(engine.renderer().emitted(), ["-1", "0.5"]);
    }
}
