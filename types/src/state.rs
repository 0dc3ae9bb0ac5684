//! Pipeline and element state definitions.

use serde::{Deserialize, Serialize};

/// GStreamer element/pipeline state.
///
/// These states correspond to the GStreamer GST_STATE enum, in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum State {
    /// No pending state (only meaningful as the pending part of a transition)
    VoidPending,
    /// Initial state, no resources allocated
    #[default]
    Null,
    /// Resources allocated, ready to go to PAUSED
    Ready,
    /// Prerolled and ready to accept data, clock not running
    Paused,
    /// Data is flowing and the clock is running
    Playing,
}

impl State {
    /// Numeric code used by GStreamer for this state.
    pub fn code(self) -> u32 {
        match self {
            Self::VoidPending => 0,
            Self::Null => 1,
            Self::Ready => 2,
            Self::Paused => 3,
            Self::Playing => 4,
        }
    }

    /// Map a GStreamer state code back to a state.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::VoidPending),
            1 => Some(Self::Null),
            2 => Some(Self::Ready),
            3 => Some(Self::Paused),
            4 => Some(Self::Playing),
            _ => None,
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VoidPending => write!(f, "VOID_PENDING"),
            Self::Null => write!(f, "NULL"),
            Self::Ready => write!(f, "READY"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Playing => write!(f, "PLAYING"),
        }
    }
}

/// Lifecycle of a pipeline controller (not the GStreamer state).
///
/// Moves forward only: `Open -> Closing -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Lifecycle {
    /// Created; all operations are allowed
    #[default]
    Open,
    /// Teardown started; operations fail, native resources not yet freed
    Closing,
    /// Native resources freed and the correlation ID retired
    Closed,
}

impl Lifecycle {
    /// Whether operations on the controller are still allowed.
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
