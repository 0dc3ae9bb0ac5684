//! Pipeline controller built from a launch description.
//!
//! A [`GstLaunch`] owns one pipeline. Bus messages reach it only through the
//! dispatch table: the message handler installed on the bus captures nothing
//! but the controller's [`LaunchId`]. Teardown is asynchronous and runs in
//! two phases on the engine runtime, see [`GstLaunch::kill`].

mod bus;
mod elements;
mod lifecycle;

use super::dispatch;
use super::engine::{self, EngineError};
use super::handle::ElementHandle;
use crate::events::EventBroadcaster;
use futures::Stream;
use gstlaunch_types::{LaunchEvent, LaunchId, Lifecycle, State};
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

/// Contexts created and not yet fully torn down.
static LIVE_CONTEXTS: AtomicUsize = AtomicUsize::new(0);

/// Called when the pipeline reaches end of stream.
pub type EosCallback = Arc<dyn Fn() + Send + Sync>;

/// Called with the element that posted an error (if any), the error message
/// and the optional debug string.
///
/// The element handle carries its own reference; dropping it releases it.
pub type ErrorCallback = Arc<dyn Fn(Option<ElementHandle>, &str, Option<&str>) + Send + Sync>;

/// Called with the old, new and pending state of the top-level pipeline.
pub type StateCallback = Arc<dyn Fn(State, State, State) + Send + Sync>;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Failed to construct pipeline: {0}")]
    Construction(String),

    #[error("Pipeline is closed")]
    Closed,

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Pipeline state change failed: {0}")]
    StateChange(String),

    #[error("Element iteration failed")]
    Iteration,

    #[error("Timed out waiting for pipeline")]
    Timeout,
}

/// Native resources of one controller.
pub(crate) struct PipelineContext {
    pipeline: gst::Pipeline,
    bus: gst::Bus,
    message_handler: Option<glib::SignalHandlerId>,
}

#[derive(Default, Clone)]
struct Callbacks {
    eos: Option<EosCallback>,
    error: Option<ErrorCallback>,
    state: Option<StateCallback>,
}

struct LaunchInner {
    /// Taken by teardown.
    context: Option<PipelineContext>,
    callbacks: Callbacks,
}

/// State shared by every clone of a [`GstLaunch`].
pub(crate) struct LaunchShared {
    id: LaunchId,
    inner: Mutex<LaunchInner>,
    active: AtomicBool,
    /// Claimed by the first `kill()`, under the `inner` lock.
    killing: AtomicBool,
    lifecycle: watch::Sender<Lifecycle>,
    events: EventBroadcaster,
}

impl LaunchShared {
    fn new(id: LaunchId, pipeline: gst::Pipeline, bus: gst::Bus, buffer_size: usize) -> Self {
        LIVE_CONTEXTS.fetch_add(1, Ordering::SeqCst);
        let (lifecycle, _) = watch::channel(Lifecycle::Open);
        Self {
            id,
            inner: Mutex::new(LaunchInner {
                context: Some(PipelineContext {
                    pipeline,
                    bus,
                    message_handler: None,
                }),
                callbacks: Callbacks::default(),
            }),
            active: AtomicBool::new(false),
            killing: AtomicBool::new(false),
            lifecycle,
            events: EventBroadcaster::new(buffer_size),
        }
    }
}

impl Drop for LaunchShared {
    fn drop(&mut self) {
        // Only reached with a context when every handle was dropped without
        // kill(); teardown otherwise took it already.
        if let Some(context) = self.inner.get_mut().context.take() {
            debug!("Launch {} dropped while open, scheduling teardown", self.id);
            lifecycle::schedule_release(self.id, context);
        }
    }
}

/// Handle onto a pipeline built from a launch description.
///
/// Clones share the same pipeline and callbacks.
#[derive(Clone)]
pub struct GstLaunch {
    shared: Arc<LaunchShared>,
}

impl GstLaunch {
    /// Build a pipeline from `description`, in gst-launch syntax.
    ///
    /// Initializes the engine on first use. A description yielding a single
    /// element is wrapped into a new pipeline.
    pub fn new(description: &str) -> Result<Self, LaunchError> {
        let engine = engine::init()?;

        let element = gst::parse::launch(description)
            .map_err(|e| LaunchError::Construction(e.to_string()))?;
        let pipeline = match element.downcast::<gst::Pipeline>() {
            Ok(pipeline) => pipeline,
            Err(element) => {
                debug!("Wrapping single element '{}' in a pipeline", element.name());
                let pipeline = gst::Pipeline::new();
                pipeline
                    .add(&element)
                    .map_err(|e| LaunchError::Construction(e.to_string()))?;
                pipeline
            }
        };
        let bus = pipeline
            .bus()
            .ok_or_else(|| LaunchError::Construction("pipeline has no bus".to_string()))?;

        let buffer_size = engine.config().event_buffer_size;
        let shared = dispatch::register(|id| {
            Arc::new(LaunchShared::new(id, pipeline, bus, buffer_size))
        });
        let launch = Self::from_shared(shared);
        launch.setup_bus_watch();

        info!("Created launch {}: {}", launch.id(), description);
        Ok(launch)
    }

    /// Like [`GstLaunch::new`], but panics if the pipeline cannot be built.
    pub fn must_new(description: &str) -> Self {
        match Self::new(description) {
            Ok(launch) => launch,
            Err(e) => panic!("Failed to build pipeline '{}': {}", description, e),
        }
    }

    pub(crate) fn from_shared(shared: Arc<LaunchShared>) -> Self {
        Self { shared }
    }

    /// Correlation ID of this controller.
    pub fn id(&self) -> LaunchId {
        self.shared.id
    }

    /// Whether the pipeline last reported reaching Playing.
    ///
    /// Always false once the controller has started closing.
    pub fn active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst) && self.lifecycle().is_open()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.shared.lifecycle.borrow()
    }

    /// Subscribe to the events of this controller.
    pub fn subscribe(&self) -> broadcast::Receiver<LaunchEvent> {
        self.shared.events.subscribe()
    }

    /// Events of this controller as a stream.
    pub fn events(&self) -> impl Stream<Item = LaunchEvent> + Send + 'static {
        self.shared.events.stream()
    }

    /// Wait until the controller starts closing, by `kill` or by the pipeline
    /// reaching Null.
    pub async fn wait(&self, timeout: Duration) -> Result<(), LaunchError> {
        self.wait_for_lifecycle(timeout, |lifecycle| !lifecycle.is_open())
            .await
    }

    /// Wait until teardown has released every native resource.
    pub async fn wait_closed(&self, timeout: Duration) -> Result<(), LaunchError> {
        self.wait_for_lifecycle(timeout, |lifecycle| *lifecycle == Lifecycle::Closed)
            .await
    }

    async fn wait_for_lifecycle<F>(&self, timeout: Duration, reached: F) -> Result<(), LaunchError>
    where
        F: FnMut(&Lifecycle) -> bool,
    {
        let mut rx = self.shared.lifecycle.subscribe();
        let result = match tokio::time::timeout(timeout, rx.wait_for(reached)).await {
            Ok(_) => Ok(()),
            Err(_) => Err(LaunchError::Timeout),
        };
        result
    }

    /// Run `f` on the pipeline if the controller is still open.
    fn with_open_context<T, F>(&self, f: F) -> Result<T, LaunchError>
    where
        F: FnOnce(&mut PipelineContext, &mut Callbacks) -> Result<T, LaunchError>,
    {
        let mut inner = self.shared.inner.lock();
        if !self.lifecycle().is_open() || self.shared.killing.load(Ordering::SeqCst) {
            return Err(LaunchError::Closed);
        }
        let LaunchInner { context, callbacks } = &mut *inner;
        let context = context.as_mut().ok_or(LaunchError::Closed)?;
        f(context, callbacks)
    }

    fn callbacks(&self) -> Callbacks {
        self.shared.inner.lock().callbacks.clone()
    }
}

impl std::fmt::Debug for GstLaunch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GstLaunch")
            .field("id", &self.id())
            .field("lifecycle", &self.lifecycle())
            .field("active", &self.active())
            .finish()
    }
}

/// Number of pipeline contexts not yet fully torn down, process-wide.
pub fn live_contexts() -> usize {
    LIVE_CONTEXTS.load(Ordering::SeqCst)
}
