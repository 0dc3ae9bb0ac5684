use super::{GstLaunch, LaunchError, LaunchShared, PipelineContext, LIVE_CONTEXTS};
use crate::gst::dispatch;
use crate::gst::engine::{self, Engine};
use gstlaunch_types::{LaunchEvent, LaunchId, Lifecycle, State};
use gstreamer as gst;
use gstreamer::prelude::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

impl GstLaunch {
    /// Request the Playing state.
    ///
    /// The transition completes asynchronously and is reported through the
    /// state callback. Must not be called from a callback of this controller.
    pub fn start(&self) -> Result<(), LaunchError> {
        self.with_open_context(|context, _| {
            info!("Starting launch {}", self.id());
            match context.pipeline.set_state(gst::State::Playing) {
                Ok(success) => {
                    debug!("Launch {} set_state(Playing): {:?}", self.id(), success);
                    Ok(())
                }
                Err(e) => {
                    // The bus still carries the error message that explains it
                    error!("Launch {} failed to start: {}", self.id(), e);
                    Err(LaunchError::StateChange(format!("Failed to start: {}", e)))
                }
            }
        })
    }

    /// Stop the pipeline and start closing the controller.
    ///
    /// The pipeline is set to Null before returning and a Ready -> Null
    /// transition is reported to the state callback. Native resources are
    /// released later on the engine runtime: first the pipeline after the
    /// configured unref delay, then the bus watch once the main loop has
    /// drained.
    ///
    /// Only one caller wins a race between clones; the others get
    /// [`LaunchError::Closed`].
    pub fn kill(&self) -> Result<(), LaunchError> {
        self.with_open_context(|context, _| {
            if self.shared.killing.swap(true, Ordering::SeqCst) {
                return Err(LaunchError::Closed);
            }
            info!("Killing launch {}", self.id());

            // Some elements block_on() internally during state changes, which
            // panics inside a tokio runtime, so use a plain thread.
            let pipeline = context.pipeline.clone();
            match std::thread::spawn(move || pipeline.set_state(gst::State::Null)).join() {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Launch {} failed to reach Null: {}", self.id(), e),
                Err(_) => warn!("Launch {} set_state thread panicked", self.id()),
            }
            Ok(())
        })?;

        self.apply_state(State::Ready, State::Null, State::VoidPending);
        Ok(())
    }

    /// Move from Open to Closing and schedule teardown. Only the first call
    /// has an effect.
    pub(super) fn begin_close(&self) -> bool {
        let closing = self.shared.lifecycle.send_if_modified(|lifecycle| {
            if lifecycle.is_open() {
                *lifecycle = Lifecycle::Closing;
                true
            } else {
                false
            }
        });
        if !closing {
            return false;
        }

        debug!("Launch {} closing", self.id());
        match engine::get() {
            Some(engine) => {
                let shared = self.shared.clone();
                engine.runtime().spawn(teardown(shared, engine));
            }
            None => error!("Engine gone, launch {} cannot be torn down", self.id()),
        }
        true
    }
}

/// Release everything `shared` owns, then mark it Closed.
async fn teardown(shared: Arc<LaunchShared>, engine: &'static Engine) {
    tokio::time::sleep(engine.config().unref_delay).await;

    let context = shared.inner.lock().context.take();
    if let Some(context) = context {
        release_context(shared.id, context, engine).await;
    }

    shared.lifecycle.send_replace(Lifecycle::Closed);
    shared.events.broadcast(LaunchEvent::Closed {
        launch_id: shared.id,
    });
    info!("Launch {} closed", shared.id);
}

/// Schedule release of a context whose controller is already gone.
pub(super) fn schedule_release(id: LaunchId, context: PipelineContext) {
    let Some(engine) = engine::get() else {
        warn!("Engine gone, releasing launch {} in place", id);
        dispatch::unregister(id);
        drop(context);
        LIVE_CONTEXTS.fetch_sub(1, Ordering::SeqCst);
        return;
    };
    engine.runtime().spawn(async move {
        tokio::time::sleep(engine.config().unref_delay).await;
        release_context(id, context, engine).await;
    });
}

/// Two-phase release of one context.
///
/// Phase one retires the ID and stops and drops the pipeline. Phase two waits
/// for the main loop to run a marker queued behind any bus dispatch already
/// pending, bounded by the grace period, and only then removes the bus watch.
async fn release_context(id: LaunchId, context: PipelineContext, engine: &'static Engine) {
    dispatch::unregister(id);

    let PipelineContext {
        pipeline,
        bus,
        message_handler,
    } = context;

    let stopped = tokio::task::spawn_blocking(move || pipeline.set_state(gst::State::Null)).await;
    match stopped {
        Ok(Ok(_)) => debug!("Launch {} pipeline released", id),
        Ok(Err(e)) => warn!("Launch {} failed to reach Null during teardown: {}", id, e),
        Err(e) => warn!("Launch {} teardown task failed: {}", id, e),
    }

    let (tx, rx) = oneshot::channel();
    engine.run_on_main_loop(move || {
        let _ = tx.send(());
    });
    let grace_period = engine.config().grace_period;
    if tokio::time::timeout(grace_period, rx).await.is_err() {
        warn!(
            "Main loop did not drain within {:?} for launch {}",
            grace_period, id
        );
    }

    if let Some(handler) = message_handler {
        bus.disconnect(handler);
        bus.remove_signal_watch();
    }
    drop(bus);

    LIVE_CONTEXTS.fetch_sub(1, Ordering::SeqCst);
    debug!("Launch {} context freed", id);
}
