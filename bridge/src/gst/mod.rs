//! GStreamer integration.

pub mod appsink;
pub mod appsrc;
pub mod dispatch;
pub mod element;
pub mod engine;
pub mod handle;
pub mod launch;

pub use appsink::{AppSink, AppSinkError};
pub use appsrc::{AppSource, AppSourceError};
pub use element::ElementError;
pub use engine::{Engine, EngineError};
pub use handle::ElementHandle;
pub use launch::{live_contexts, GstLaunch, LaunchError};

use gstlaunch_types::State;
use gstreamer as gst;

pub(crate) fn to_state(state: gst::State) -> State {
    match state {
        gst::State::VoidPending => State::VoidPending,
        gst::State::Null => State::Null,
        gst::State::Ready => State::Ready,
        gst::State::Paused => State::Paused,
        gst::State::Playing => State::Playing,
        _ => State::VoidPending,
    }
}
