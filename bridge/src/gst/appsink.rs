//! Receiving pipeline buffers through `appsink`.
//!
//! Handlers live in a process-wide registry keyed by a small integer ID. The
//! callback installed on the appsink captures only that ID, so a buffer that
//! arrives after the handler was closed finds nothing and is dropped.

use super::handle::ElementHandle;
use gstlaunch_types::HandlerId;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Callback receiving the bytes of one buffer and the number of audio
/// frames it covers.
///
/// The second argument is `duration * rate` with the `rate` field of the
/// sample caps, not the buffer duration itself. It is 0 for caps without a
/// `rate` (video, raw bytes) and for buffers without a duration; handlers
/// that need the duration of such buffers do not get it here.
pub type BufferHandler = Arc<dyn Fn(&[u8], u64) + Send + Sync>;

static NEXT_HANDLER_ID: AtomicU32 = AtomicU32::new(1);
static HANDLERS: LazyLock<RwLock<HashMap<HandlerId, BufferHandler>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppSinkError {
    #[error("Element '{0}' is not an appsink")]
    NotAppSink(String),
}

/// Data extraction endpoint wrapping an `appsink` element.
///
/// The handler stays registered until [`AppSink::close`] or drop.
pub struct AppSink {
    appsink: gst_app::AppSink,
    id: HandlerId,
    closed: AtomicBool,
}

impl AppSink {
    /// Wrap an element, which must be an `appsink`, and route its buffers to
    /// `handler`.
    ///
    /// The handler runs on a GStreamer streaming thread.
    pub fn new<F>(element: &ElementHandle, handler: F) -> Result<Self, AppSinkError>
    where
        F: Fn(&[u8], u64) + Send + Sync + 'static,
    {
        let appsink = element
            .element()
            .clone()
            .downcast::<gst_app::AppSink>()
            .map_err(|e| AppSinkError::NotAppSink(e.name().to_string()))?;

        let id = register_handler(Arc::new(handler));
        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| on_new_sample(id, sink))
                .build(),
        );
        debug!("Registered buffer handler {} on '{}'", id, appsink.name());

        Ok(Self {
            appsink,
            id,
            closed: AtomicBool::new(false),
        })
    }

    /// Registry ID of this sink's handler.
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Name of the wrapped element.
    pub fn name(&self) -> String {
        self.appsink.name().to_string()
    }

    /// Stop delivering buffers to the handler. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        unregister_handler(self.id);
        debug!("Closed buffer handler {} on '{}'", self.id, self.appsink.name());
    }
}

impl Drop for AppSink {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for AppSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppSink")
            .field("name", &self.appsink.name())
            .field("id", &self.id)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

pub(crate) fn register_handler(handler: BufferHandler) -> HandlerId {
    let id = NEXT_HANDLER_ID.fetch_add(1, Ordering::SeqCst);
    HANDLERS.write().insert(id, handler);
    id
}

pub(crate) fn unregister_handler(id: HandlerId) -> bool {
    HANDLERS.write().remove(&id).is_some()
}

/// Hand one buffer to the handler registered under `id`.
///
/// The handler is cloned out of the registry and called after the read lock
/// is released, so a slow handler never blocks registration or close.
pub(crate) fn deliver(id: HandlerId, data: &[u8], samples: u64) -> bool {
    let handler = HANDLERS.read().get(&id).cloned();
    match handler {
        Some(handler) => {
            handler(data, samples);
            true
        }
        None => {
            warn!("Unhandled buffer received (handler id: {})", id);
            false
        }
    }
}

fn on_new_sample(
    id: HandlerId,
    sink: &gst_app::AppSink,
) -> Result<gst::FlowSuccess, gst::FlowError> {
    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
    let Some(buffer) = sample.buffer() else {
        trace!("Sample without buffer on handler {}", id);
        return Ok(gst::FlowSuccess::Ok);
    };
    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;
    let samples = sample_count(buffer.duration(), sample.caps());

    // An unknown ID is not a streaming error; the buffer is just dropped.
    deliver(id, map.as_slice(), samples);
    Ok(gst::FlowSuccess::Ok)
}

/// Audio samples covered by a buffer, from its duration and the caps rate.
fn sample_count(duration: Option<gst::ClockTime>, caps: Option<&gst::CapsRef>) -> u64 {
    let rate = caps
        .and_then(|caps| caps.structure(0))
        .and_then(|s| s.get::<i32>("rate").ok())
        .filter(|rate| *rate > 0);

    match (duration, rate) {
        (Some(duration), Some(rate)) => {
            (duration.nseconds() as u128 * rate as u128 / gst::ClockTime::SECOND.nseconds() as u128)
                as u64
        }
        _ => 0,
    }
}
