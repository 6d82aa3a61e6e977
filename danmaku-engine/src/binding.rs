//! Attaches a [`PlaybackSyncEngine`] to a media element and a visibility
//! source.

use crate::collab::{
    ConfigProvider, MediaEvent, MediaSource, Renderer, Subscription, Visibility, VisibilitySource,
};
use crate::sync_engine::PlaybackSyncEngine;
use danmaku_core::ParsedComment;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

/// Name passed to the renderer's lifecycle hooks
pub const PLUGIN_NAME: &str = "bind-video";

type SharedEngine<R, C> = Rc<RefCell<PlaybackSyncEngine<R, C>>>;
type Clock = Rc<dyn Fn() -> Option<f64>>;

/// Mount state shared with the listeners
#[derive(Debug)]
struct MountState {
    active: Cell<bool>,
    /// Set when unmount ran inside a handler; the handler delivers the
    /// `unmounted` hook once it returns
    hook_pending: Cell<bool>,
}

impl MountState {
    fn new() -> Self {
        Self {
            active: Cell::new(true),
            hook_pending: Cell::new(false),
        }
    }
}

/// A mounted engine and the listeners feeding it.
///
/// Dropping the binding unmounts it.
pub struct VideoBinding<R: Renderer, C: ConfigProvider> {
    engine: SharedEngine<R, C>,
    clock: Clock,
    state: Rc<MountState>,
    subscriptions: Vec<Subscription>,
}

/// Builds an engine over `comments` and mounts it on `media`
pub fn bind_video<M, V, R, C>(
    media: &Rc<M>,
    visibility: &V,
    comments: Vec<ParsedComment>,
    config: C,
    renderer: R,
) -> VideoBinding<R, C>
where
    M: MediaSource + 'static,
    V: VisibilitySource,
    R: Renderer + 'static,
    C: ConfigProvider + 'static,
{
    VideoBinding::mount(PlaybackSyncEngine::new(comments, config, renderer), media, visibility)
}

impl<R, C> VideoBinding<R, C>
where
    R: Renderer + 'static,
    C: ConfigProvider + 'static,
{
    /// Seeds the engine from the media's current position, registers it with
    /// the renderer and subscribes to every media and visibility event
    pub fn mount<M, V>(mut engine: PlaybackSyncEngine<R, C>, media: &Rc<M>, visibility: &V) -> Self
    where
        M: MediaSource + 'static,
        V: VisibilitySource,
    {
        engine.set_visibility(visibility.visibility());
        engine.reset_cursor(media.current_time());
        engine.renderer_mut().mounted(PLUGIN_NAME);

        let engine = Rc::new(RefCell::new(engine));
        let state = Rc::new(MountState::new());
        let clock: Clock = {
            let media = Rc::downgrade(media);
            Rc::new(move || media.upgrade().map(|m| m.current_time()))
        };

        let mut subscriptions: Vec<Subscription> = MediaEvent::ALL
            .iter()
            .map(|&event| {
                let target = Rc::downgrade(&engine);
                let state = Rc::clone(&state);
                let clock = Rc::clone(&clock);
                media.subscribe(
                    event,
                    Box::new(move || {
                        if let Some(position) = clock() {
                            dispatch(&target, &state, |e| e.handle(event, position));
                        }
                    }),
                )
            })
            .collect();

        let target = Rc::downgrade(&engine);
        let visible = Rc::clone(&state);
        subscriptions.push(visibility.subscribe(Box::new(move |visibility: Visibility| {
            dispatch(&target, &visible, |e| e.set_visibility(visibility));
        })));

        debug!("Mounted {} with {} listeners", PLUGIN_NAME, subscriptions.len());

        Self {
            engine,
            clock,
            state,
            subscriptions,
        }
    }
}

impl<R: Renderer, C: ConfigProvider> VideoBinding<R, C> {
    /// Options hook: re-reads the offset and resets the cursor if it changed
    pub fn update_options(&self) -> bool {
        let Some(position) = (self.clock)() else {
            return false;
        };
        let mut reset = false;
        dispatch(&Rc::downgrade(&self.engine), &self.state, |e| {
            reset = e.update_options(position);
        });
        reset
    }

    /// Runs `f` on the engine unless a handler is currently running
    pub fn with_engine<T>(&self, f: impl FnOnce(&PlaybackSyncEngine<R, C>) -> T) -> Option<T> {
        let result = self.engine.try_borrow().ok().map(|engine| f(&*engine))?;
        if self.state.hook_pending.get() {
            if let Ok(mut engine) = self.engine.try_borrow_mut() {
                self.state.hook_pending.set(false);
                engine.renderer_mut().unmounted(PLUGIN_NAME);
            }
        }
        Some(result)
    }

    pub fn is_mounted(&self) -> bool {
        self.state.active.get()
    }

    /// Removes every listener and notifies the renderer. Later calls do nothing.
    ///
    /// When called from inside a handler the renderer is notified as soon as
    /// that handler returns.
    pub fn unmount(&mut self) {
        if !self.state.active.replace(false) {
            return;
        }

        for subscription in &mut self.subscriptions {
            subscription.cancel();
        }
        self.subscriptions.clear();

        match self.engine.try_borrow_mut() {
            Ok(mut engine) => engine.renderer_mut().unmounted(PLUGIN_NAME),
            Err(_) => {
                debug!("Unmounting {} from inside a handler", PLUGIN_NAME);
                self.state.hook_pending.set(true);
            }
        }
        debug!("Unmounted {}", PLUGIN_NAME);
    }
}

impl<R: Renderer, C: ConfigProvider> Drop for VideoBinding<R, C> {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Runs `f` on a live engine; events after unmount and re-entrant events
/// are dropped
fn dispatch<R: Renderer, C: ConfigProvider>(
    target: &Weak<RefCell<PlaybackSyncEngine<R, C>>>,
    state: &MountState,
    f: impl FnOnce(&mut PlaybackSyncEngine<R, C>),
) {
    if !state.active.get() {
        return;
    }
    let Some(shared) = target.upgrade() else {
        return;
    };
    let Ok(mut engine) = shared.try_borrow_mut() else {
        warn!("Dropping re-entrant playback event");
        return;
    };

    f(&mut *engine);

    if state.hook_pending.replace(false) {
        engine.renderer_mut().unmounted(PLUGIN_NAME);
    }
}
