//! Danmaku Engine Library
//!
//! This library keeps a cursor into a sorted comment stream in step with a
//! playing video and hands due comments to a renderer. Seeks, pauses, stalls,
//! resumes, tab visibility and offset changes are handled as discrete events.

pub mod binding;
pub mod collab;
pub mod sync_engine;

pub use binding::{bind_video, VideoBinding, PLUGIN_NAME};
pub use collab::{
    ConfigProvider, FixedOptions, MediaEvent, MediaSource, PriorityOptions, Renderer,
    ScrollDirection, SharedOptions, Subscription, Visibility, VisibilitySource,
};
pub use sync_engine::{PlaybackSyncEngine, PROGRESS_SNAP_THRESHOLD};
