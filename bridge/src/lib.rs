//! gstlaunch: GStreamer pipelines from launch descriptions, with bus events
//! delivered to Rust callbacks.
//!
//! ```no_run
//! use gstlaunch::GstLaunch;
//!
//! let launch = GstLaunch::new("audiotestsrc num-buffers=10 ! fakesink")?;
//! launch.register_eos_callback(|| println!("done"))?;
//! launch.start()?;
//! # Ok::<(), gstlaunch::LaunchError>(())
//! ```

pub mod config;
pub mod events;
pub mod gst;

pub use gst::{
    AppSink, AppSinkError, AppSource, AppSourceError, ElementError, ElementHandle, GstLaunch,
    LaunchError,
};
pub use gstlaunch_types::{LaunchEvent, LaunchId, Lifecycle, PropertyValue, State};
