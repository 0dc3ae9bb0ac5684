//! Events published by a running pipeline controller.

use crate::state::State;
use crate::LaunchId;
use serde::{Deserialize, Serialize};

/// Event types delivered from the GStreamer bus to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LaunchEvent {
    /// The pipeline reached end of stream
    Eos { launch_id: LaunchId },
    /// An element posted an error message
    Error {
        launch_id: LaunchId,
        /// Name of the element that posted the error, if it was an element
        source: Option<String>,
        message: String,
        debug: Option<String>,
    },
    /// The top-level pipeline changed state
    StateChanged {
        launch_id: LaunchId,
        old: State,
        new: State,
        pending: State,
    },
    /// The controller released its native resources
    Closed { launch_id: LaunchId },
}

impl LaunchEvent {
    /// Correlation ID of the controller that produced the event.
    pub fn launch_id(&self) -> LaunchId {
        match self {
            LaunchEvent::Eos { launch_id }
            | LaunchEvent::Error { launch_id, .. }
            | LaunchEvent::StateChanged { launch_id, .. }
            | LaunchEvent::Closed { launch_id } => *launch_id,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            LaunchEvent::Eos { launch_id } => {
                format!("Pipeline {} reached end of stream", launch_id)
            }
            LaunchEvent::Error {
                launch_id,
                source,
                message,
                ..
            } => {
                if let Some(src) = source {
                    format!("Pipeline error in {} from {}: {}", launch_id, src, message)
                } else {
                    format!("Pipeline error in {}: {}", launch_id, message)
                }
            }
            LaunchEvent::StateChanged {
                launch_id,
                old,
                new,
                pending,
            } => format!(
                "Pipeline {} state changed: {} -> {} (pending: {})",
                launch_id, old, new, pending
            ),
            LaunchEvent::Closed { launch_id } => format!("Pipeline {} closed", launch_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = LaunchEvent::StateChanged {
            launch_id: 3,
            old: State::Paused,
            new: State::Playing,
            pending: State::VoidPending,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StateChanged");
        assert_eq!(json["data"]["launch_id"], 3);
        assert_eq!(json["data"]["new"], "Playing");

        let back: LaunchEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_description_mentions_source() {
        let event = LaunchEvent::Error {
            launch_id: 1,
            source: Some("watchdog0".to_string()),
            message: "Watchdog triggered".to_string(),
            debug: None,
        };
        assert_eq!(event.launch_id(), 1);
        assert!(event.description().contains("watchdog0"));
    }

    #[test]
    fn test_eos_description() {
        let event = LaunchEvent::Eos { launch_id: 7 };
        assert_eq!(event.description(), "Pipeline 7 reached end of stream");
    }
}
