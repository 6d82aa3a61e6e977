//! Interfaces to the collaborators around the engine: the media element, the
//! page visibility, the renderer and the live options.

use danmaku_core::{DanmakuOptions, FixedMode, ParsedComment};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Playback events delivered by a [`MediaSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEvent {
    /// The playback position moved forward during normal playback
    PositionAdvanced,
    /// The position jumped
    Seek,
    Paused,
    /// Playback halted waiting for data
    Stalled,
    Resumed,
    /// Playback restarted after a stall
    ResumedAfterStall,
}

impl MediaEvent {
    pub const ALL: [MediaEvent; 6] = [
        MediaEvent::PositionAdvanced,
        MediaEvent::Seek,
        MediaEvent::Paused,
        MediaEvent::Stalled,
        MediaEvent::Resumed,
        MediaEvent::ResumedAfterStall,
    ];
}

/// Page visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Scroll direction of a priority comment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    /// Right to left
    Left,
    /// Left to right
    Right,
}

/// Options for [`Renderer::insert_priority`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityOptions {
    /// How far through its on-screen animation the comment starts, in `[0, 1]`
    pub progress: f64,
    pub direction: ScrollDirection,
}

/// Options for [`Renderer::insert_fixed`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedOptions {
    pub mode: FixedMode,
    /// How long the comment stays pinned, in seconds
    pub duration_secs: f64,
}

/// The comment renderer.
///
/// Lane allocation, painting and the scroll clock live behind this trait.
pub trait Renderer {
    /// Puts a scrolling comment at the front of the queue
    fn insert_priority(&mut self, comment: &ParsedComment, options: PriorityOptions);

    /// Pins a comment to a top or bottom lane
    fn insert_fixed(&mut self, comment: &ParsedComment, options: FixedOptions);

    /// Checks if every lane of the group is taken
    fn is_lane_full(&self, mode: FixedMode) -> bool;

    fn is_frozen(&self) -> bool;

    /// Stops spawning fixed comments and holds the ones on screen
    fn freeze(&mut self);

    fn unfreeze(&mut self);

    /// Removes every comment on screen and queued
    fn clear(&mut self);

    fn start_clock(&mut self);

    fn stop_clock(&mut self);

    /// Called when a plugin attaches to this renderer
    fn mounted(&mut self, _plugin: &str) {}

    /// Called when a plugin detaches from this renderer
    fn unmounted(&mut self, _plugin: &str) {}
}

/// A handle that removes a listener when cancelled or dropped.
///
/// Cancelling more than once is a no-op.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// The playing media element
pub trait MediaSource {
    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    /// Registers `listener` for `event`
    fn subscribe(&self, event: MediaEvent, listener: Box<dyn Fn()>) -> Subscription;
}

/// The page or window visibility state
pub trait VisibilitySource {
    fn visibility(&self) -> Visibility;

    fn subscribe(&self, listener: Box<dyn Fn(Visibility)>) -> Subscription;
}

/// Live access to the current options.
///
/// The engine calls this on every event and never keeps the result.
pub trait ConfigProvider {
    fn options(&self) -> DanmakuOptions;
}

impl<F> ConfigProvider for F
where
    F: Fn() -> DanmakuOptions,
{
    fn options(&self) -> DanmakuOptions {
        self()
    }
}

/// Options shared between the engine and whoever edits them
#[derive(Debug, Clone, Default)]
pub struct SharedOptions(Rc<RefCell<DanmakuOptions>>);

impl SharedOptions {
    pub fn new(options: DanmakuOptions) -> Self {
        Self(Rc::new(RefCell::new(options)))
    }

    /// Applies `f` to the options; the engine sees the change on its next read
    pub fn update(&self, f: impl FnOnce(&mut DanmakuOptions)) {
        f(&mut self.0.borrow_mut());
    }

    pub fn get(&self) -> DanmakuOptions {
        self.0.borrow().clone()
    }
}

impl ConfigProvider for SharedOptions {
    fn options(&self) -> DanmakuOptions {
        self.get()
    }
}
