use super::GstLaunch;
use crate::gst::dispatch;
use crate::gst::handle::ElementHandle;
use crate::gst::to_state;
use gstlaunch_types::{LaunchEvent, LaunchId, State};
use gstreamer as gst;
use gstreamer::prelude::*;
use std::sync::atomic::Ordering;
use tracing::{debug, error, info, trace, warn};

impl GstLaunch {
    /// Install the bus message handler.
    ///
    /// The handler runs on the main-loop thread and captures only the ID.
    pub(super) fn setup_bus_watch(&self) {
        let id = self.id();
        let mut inner = self.shared.inner.lock();
        let Some(context) = inner.context.as_mut() else {
            return;
        };

        // Ref-counted, balanced by remove_signal_watch() in teardown
        context.bus.add_signal_watch();
        let handler = context
            .bus
            .connect_message(None, move |_bus, msg| dispatch_message(id, msg));
        context.message_handler = Some(handler);
        debug!("Bus watch installed for launch {}", id);
    }

    pub(super) fn handle_eos(&self) {
        if !self.lifecycle().is_open() {
            trace!("Dropping EOS for closing launch {}", self.id());
            return;
        }
        info!("Launch {} reached end of stream", self.id());

        if let Some(callback) = self.callbacks().eos {
            callback();
        } else {
            debug!("No EOS callback registered for launch {}", self.id());
        }
        self.shared.events.broadcast(LaunchEvent::Eos {
            launch_id: self.id(),
        });
    }

    pub(super) fn handle_error(
        &self,
        source: Option<ElementHandle>,
        message: &str,
        debug: Option<&str>,
    ) {
        if !self.lifecycle().is_open() {
            trace!("Dropping error for closing launch {}: {}", self.id(), message);
            return;
        }
        let source_name = source.as_ref().map(ElementHandle::name);
        let event = LaunchEvent::Error {
            launch_id: self.id(),
            source: source_name.clone(),
            message: message.to_string(),
            debug: debug.map(str::to_string),
        };

        match self.callbacks().error {
            Some(callback) => callback(source, message, debug),
            None => {
                // tracing's macros import `field::debug`, shadowing the parameter.
                let debug_info = debug;
                error!(
                    "Unhandled pipeline error in launch {}: {} (debug: {:?}, source: {:?})",
                    self.id(),
                    message,
                    debug_info,
                    source_name
                )
            }
        }
        self.shared.events.broadcast(event);
    }

    pub(super) fn handle_state_changed(&self, old: State, new: State, pending: State) {
        if !self.lifecycle().is_open() {
            trace!("Dropping state change for closing launch {}", self.id());
            return;
        }
        self.apply_state(old, new, pending);
    }

    /// Apply a state transition: callback first, then the `active` flag.
    /// Reaching Null starts closing the controller.
    pub(super) fn apply_state(&self, old: State, new: State, pending: State) {
        debug!(
            "Launch {} state changed: {} -> {} (pending: {})",
            self.id(),
            old,
            new,
            pending
        );

        if let Some(callback) = self.callbacks().state {
            callback(old, new, pending);
        }
        self.shared.events.broadcast(LaunchEvent::StateChanged {
            launch_id: self.id(),
            old,
            new,
            pending,
        });

        match new {
            State::Playing => self.shared.active.store(true, Ordering::SeqCst),
            State::Null => {
                self.shared.active.store(false, Ordering::SeqCst);
                self.begin_close();
            }
            _ => self.shared.active.store(false, Ordering::SeqCst),
        }
    }
}

/// Route one bus message to the matching entry point.
fn dispatch_message(id: LaunchId, msg: &gst::Message) {
    use gst::MessageView;

    trace!("Bus message for launch {}: {:?}", id, msg.type_());

    match msg.view() {
        MessageView::Eos(_) => on_eos(id),
        MessageView::Error(err) => {
            let source = err
                .src()
                .and_then(|s| s.downcast_ref::<gst::Element>())
                .map(|element| ElementHandle::from(element.clone()));
            let debug = err.debug();
            on_error(id, source, &err.error().to_string(), debug.as_deref());
        }
        MessageView::StateChanged(state_changed) => {
            // Child elements post their own transitions; only the top-level
            // pipeline drives the controller.
            let from_pipeline = msg
                .src()
                .is_some_and(|s| s.parent().is_none() && s.is::<gst::Pipeline>());
            if from_pipeline {
                on_state_changed(
                    id,
                    to_state(state_changed.old()),
                    to_state(state_changed.current()),
                    to_state(state_changed.pending()),
                );
            }
        }
        _ => {}
    }
}

/// End-of-stream entry point.
pub(crate) fn on_eos(id: LaunchId) {
    match dispatch::resolve(id) {
        Some(launch) => launch.handle_eos(),
        None => warn!("EOS for unknown launch {}", id),
    }
}

/// Error entry point.
pub(crate) fn on_error(
    id: LaunchId,
    source: Option<ElementHandle>,
    message: &str,
    debug: Option<&str>,
) {
    match dispatch::resolve(id) {
        Some(launch) => launch.handle_error(source, message, debug),
        None => warn!("Error for unknown launch {}: {}", id, message),
    }
}

/// State-change entry point.
pub(crate) fn on_state_changed(id: LaunchId, old: State, new: State, pending: State) {
    match dispatch::resolve(id) {
        Some(launch) => launch.handle_state_changed(old, new, pending),
        None => warn!("State change {} -> {} for unknown launch {}", old, new, id),
    }
}
