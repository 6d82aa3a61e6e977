//! Scripted playback replay
//!
//! A script is a JSON array of steps. Event steps move the playhead and fire
//! a media or visibility event; option steps change the offset:
//!
//! ```json
//! [
//!   { "at": 0, "event": "play" },
//!   { "at": 12.5, "event": "tick" },
//!   { "offsetMs": 1500 },
//!   { "at": 80, "event": "seek" }
//! ]
//! ```

use anyhow::{Context, Result};
use danmaku_core::{parse_comments, CompiledFilters, DanmakuOptions, FixedMode, ParsedComment};
use danmaku_engine::{
    FixedOptions, MediaEvent, MediaSource, PlaybackSyncEngine, PriorityOptions, Renderer,
    ScrollDirection, SharedOptions, Subscription, VideoBinding, Visibility, VisibilitySource,
};
use serde::Deserialize;
use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::rc::Rc;
use tracing::info;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ScriptEvent {
    Tick,
    Seek,
    Pause,
    Stall,
    Play,
    Resume,
    Hide,
    Show,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Step {
    Event { at: f64, event: ScriptEvent },
    Options {
        #[serde(rename = "offsetMs")]
        offset_ms: i64,
    },
}

/// Listeners keyed by registration id
struct ListenerSet<T> {
    next_id: Cell<u64>,
    entries: Rc<RefCell<Vec<(u64, T)>>>,
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self {
            next_id: Cell::new(0),
            entries: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<T: Clone + 'static> ListenerSet<T> {
    fn add(&self, entry: T) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push((id, entry));

        let entries = Rc::downgrade(&self.entries);
        Subscription::new(move || {
            if let Some(entries) = entries.upgrade() {
                entries.borrow_mut().retain(|(i, _)| *i != id);
            }
        })
    }

    /// Copies the current listeners so they can run without holding a borrow
    fn snapshot(&self) -> Vec<T> {
        self.entries.borrow().iter().map(|(_, e)| e.clone()).collect()
    }
}

/// A media element whose playhead only moves when the script says so
#[derive(Default)]
struct ScriptedMedia {
    time: Cell<f64>,
    listeners: ListenerSet<(MediaEvent, Rc<dyn Fn()>)>,
}

impl ScriptedMedia {
    fn fire(&self, event: MediaEvent) {
        for (kind, listener) in self.listeners.snapshot() {
            if kind == event {
                listener();
            }
        }
    }
}

impl MediaSource for ScriptedMedia {
    fn current_time(&self) -> f64 {
        self.time.get()
    }

    fn subscribe(&self, event: MediaEvent, listener: Box<dyn Fn()>) -> Subscription {
        self.listeners.add((event, Rc::from(listener)))
    }
}

#[derive(Default)]
struct ScriptedVisibility {
    hidden: Cell<bool>,
    listeners: ListenerSet<Rc<dyn Fn(Visibility)>>,
}

impl ScriptedVisibility {
    fn set(&self, visibility: Visibility) {
        self.hidden.set(visibility == Visibility::Hidden);
        for listener in self.listeners.snapshot() {
            listener(visibility);
        }
    }
}

impl VisibilitySource for ScriptedVisibility {
    fn visibility(&self) -> Visibility {
        if self.hidden.get() {
            Visibility::Hidden
        } else {
            Visibility::Visible
        }
    }

    fn subscribe(&self, listener: Box<dyn Fn(Visibility)>) -> Subscription {
        self.listeners.add(Rc::from(listener))
    }
}

/// Prints renderer calls to stdout. Fixed lanes never fill up.
#[derive(Default)]
struct ConsoleRenderer {
    frozen: bool,
    emitted: Rc<Cell<usize>>,
}

impl ConsoleRenderer {
    fn count(&self) {
        self.emitted.set(self.emitted.get() + 1);
    }
}

impl Renderer for ConsoleRenderer {
    fn insert_priority(&mut self, comment: &ParsedComment, options: PriorityOptions) {
        self.count();
        let arrow = match options.direction {
            ScrollDirection::Left => "<-",
            ScrollDirection::Right => "->",
        };
        println!(
            "    {} {:>8.3}s  progress {:.2}  {}",
            arrow, comment.time, options.progress, comment.text
        );
    }

    fn insert_fixed(&mut self, comment: &ParsedComment, options: FixedOptions) {
        self.count();
        let lane = match options.mode {
            FixedMode::Top => "top",
            FixedMode::Bottom => "bot",
        };
        println!(
            "    {} {:>8.3}s  for {:.1}s  {}",
            lane, comment.time, options.duration_secs, comment.text
        );
    }

    fn is_lane_full(&self, _mode: FixedMode) -> bool {
        false
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn freeze(&mut self) {
        self.frozen = true;
        println!("    [freeze]");
    }

    fn unfreeze(&mut self) {
        self.frozen = false;
        println!("    [unfreeze]");
    }

    fn clear(&mut self) {
        println!("    [clear]");
    }

    fn start_clock(&mut self) {
        println!("    [clock start]");
    }

    fn stop_clock(&mut self) {
        println!("    [clock stop]");
    }

    fn mounted(&mut self, plugin: &str) {
        info!("Renderer attached to {}", plugin);
    }

    fn unmounted(&mut self, plugin: &str) {
        info!("Renderer detached from {}", plugin);
    }
}

fn read_script(path: &Path) -> Result<Vec<Step>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open script {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).context("Failed to parse script")
}

/// Replays `script` over the comments in `input`
pub fn run(input: &Path, script: &Path, options: DanmakuOptions, lookback: Option<f64>) -> Result<()> {
    let mut comments = parse_comments(&crate::read_comments(input)?);
    let steps = read_script(script)?;

    // the renderer is where filters normally apply, so drop matches up front
    let filters = CompiledFilters::new(&options.filters);
    let before = comments.len();
    comments.retain(|c| !filters.is_match(&c.text));
    info!("Filtered out {} of {} comments", before - comments.len(), before);
    let total = comments.len();

    let media = Rc::new(ScriptedMedia::default());
    let visibility = ScriptedVisibility::default();
    let shared = SharedOptions::new(options);
    let renderer = ConsoleRenderer::default();
    let emitted = Rc::clone(&renderer.emitted);

    let mut engine = PlaybackSyncEngine::new(comments, shared.clone(), renderer);
    if let Some(secs) = lookback {
        engine = engine.with_lookback(secs);
    }
    let mut binding = VideoBinding::mount(engine, &media, &visibility);

    for step in steps {
        match step {
            Step::Event { at, event } => {
                media.time.set(at);
                println!("@ {:>8.3}s {:?}", at, event);
                match event {
                    ScriptEvent::Tick => media.fire(MediaEvent::PositionAdvanced),
                    ScriptEvent::Seek => media.fire(MediaEvent::Seek),
                    ScriptEvent::Pause => media.fire(MediaEvent::Paused),
                    ScriptEvent::Stall => media.fire(MediaEvent::Stalled),
                    ScriptEvent::Play => media.fire(MediaEvent::Resumed),
                    ScriptEvent::Resume => media.fire(MediaEvent::ResumedAfterStall),
                    ScriptEvent::Hide => visibility.set(Visibility::Hidden),
                    ScriptEvent::Show => visibility.set(Visibility::Visible),
                }
            }
            Step::Options { offset_ms } => {
                println!("@ {:>8.3}s offset {}ms", media.time.get(), offset_ms);
                shared.update(|o| o.offset_ms = offset_ms);
                binding.update_options();
            }
        }
    }

    let cursor = binding.with_engine(|e| e.cursor()).unwrap_or_default();
    binding.unmount();

    println!(
        "\nEmitted {} comments, cursor at {} / {}",
        emitted.get(),
        cursor,
        total
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script_steps() {
        let json = r#"[
            { "at": 1.5, "event": "tick" },
            { "offsetMs": -250 },
            { "at": 9, "event": "hide" }
        ]"#;
        let steps: Vec<Step> = serde_json::from_str(json).unwrap();

        assert!(matches!(steps[0], Step::Event { at, event: ScriptEvent::Tick } if at == 1.5));
        assert!(matches!(steps[1], Step::Options { offset_ms: -250 }));
        assert!(matches!(steps[2], Step::Event { event: ScriptEvent::Hide, .. }));
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let json = r#"[{ "at": 1, "event": "rewind" }]"#;
        assert!(serde_json::from_str::<Vec<Step>>(json).is_err());
    }

    #[test]
    fn test_listener_set_removes_on_cancel() {
        let media = ScriptedMedia::default();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut subscription = media.subscribe(
            MediaEvent::Seek,
            Box::new(move || counter.set(counter.get() + 1)),
        );

        media.fire(MediaEvent::Seek);
        media.fire(MediaEvent::Paused);
        subscription.cancel();
        media.fire(MediaEvent::Seek);

        assert_eq!(calls.get(), 1);
    }
}
