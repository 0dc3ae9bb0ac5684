//! Shared types for the gstlaunch GStreamer bridge.
//!
//! This crate contains the plain data types that cross the boundary between
//! the bridge and its callers: element states, property values and the
//! events published by a running pipeline.

/// Correlation ID of a pipeline controller.
///
/// Allocated from a monotonic counter and never reused while the process runs.
pub type LaunchId = u64;

/// Correlation ID of a registered appsink buffer handler.
pub type HandlerId = u32;

pub mod element;
pub mod events;
pub mod state;

// Re-export commonly used types
pub use element::{PropertyKind, PropertyValue};
pub use events::LaunchEvent;
pub use state::{Lifecycle, State};
