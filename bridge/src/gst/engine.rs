//! Process-wide GStreamer engine.
//!
//! Initializes GStreamer exactly once, spawns the never-joined main-loop
//! thread that dispatches bus watches, and owns the runtime on which delayed
//! pipeline teardown runs.

use crate::config::Config;
use gstreamer as gst;
use gstreamer::glib;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info};

static ENGINE: OnceLock<Engine> = OnceLock::new();
static INIT_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("GStreamer initialization failed: {0}")]
    Init(#[from] glib::Error),

    #[error("Failed to start engine thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// Initialized engine state.
pub struct Engine {
    config: Config,
    runtime: tokio::runtime::Runtime,
}

impl Engine {
    /// Configuration the engine was initialized with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle of the runtime used for background teardown.
    pub fn runtime(&self) -> &tokio::runtime::Handle {
        self.runtime.handle()
    }

    /// Queue `func` on the main-loop thread, behind any bus dispatch already
    /// pending there.
    pub fn run_on_main_loop<F>(&self, func: F)
    where
        F: FnOnce() + Send + 'static,
    {
        glib::idle_add_once(func);
    }
}

/// Initialize the engine with the default configuration.
pub fn init() -> Result<&'static Engine, EngineError> {
    init_with(Config::default())
}

/// Initialize the engine.
///
/// Only the first successful call has an effect; later calls return the
/// already running engine and ignore `config`.
pub fn init_with(config: Config) -> Result<&'static Engine, EngineError> {
    if let Some(engine) = ENGINE.get() {
        return Ok(engine);
    }

    let _guard = INIT_LOCK.lock();
    if let Some(engine) = ENGINE.get() {
        return Ok(engine);
    }

    gst::init()?;
    info!("GStreamer initialized ({})", gst::version_string());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.teardown_workers)
        .thread_name("gstlaunch-teardown")
        .enable_time()
        .build()?;

    // Bus watches attach to the global default context, so that is the one
    // the loop has to run.
    let main_loop = glib::MainLoop::new(None, false);
    std::thread::Builder::new()
        .name("gstlaunch-mainloop".to_string())
        .spawn(move || {
            debug!("Main loop thread running");
            main_loop.run();
        })?;

    debug!(
        "Engine configured: unref_delay={:?}, grace_period={:?}, teardown_workers={}",
        config.unref_delay, config.grace_period, config.teardown_workers
    );

    Ok(ENGINE.get_or_init(|| Engine {
        config,
        runtime,
    }))
}

/// The engine, if it has been initialized.
pub fn get() -> Option<&'static Engine> {
    ENGINE.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let first = init().unwrap() as *const Engine;
        let second = init_with(Config {
            teardown_workers: 7,
            ..Config::default()
        })
        .unwrap() as *const Engine;
        assert_eq!(first, second);
        assert!(get().is_some());
    }

    #[test]
    fn test_main_loop_dispatches_invocations() {
        let engine = init().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        engine.run_on_main_loop(move || {
            let _ = tx.send(std::thread::current().name().map(str::to_string));
        });
        let thread_name = rx
            .recv_timeout(std::time::Duration::from_secs(1))
            .expect("main loop must run invoked closures");
        assert_eq!(thread_name.as_deref(), Some("gstlaunch-mainloop"));
    }
}
