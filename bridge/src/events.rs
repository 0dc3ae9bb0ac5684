//! Event broadcasting for pipeline controllers.

use futures::Stream;
use gstlaunch_types::LaunchEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// Fan-out of [`LaunchEvent`]s to any number of subscribers.
#[derive(Clone)]
pub struct EventBroadcaster {
    /// Broadcast channel for events
    sender: Arc<broadcast::Sender<LaunchEvent>>,
}

impl EventBroadcaster {
    /// Create a new event broadcaster with a buffer size.
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Broadcast an event to all subscribers.
    pub fn broadcast(&self, event: LaunchEvent) {
        debug!("Broadcasting event: {}", event.description());
        // Having no subscribers is normal
        let _ = self.sender.send(event);
    }

    /// Subscribe to raw events.
    pub fn subscribe(&self) -> broadcast::Receiver<LaunchEvent> {
        self.sender.subscribe()
    }

    /// Subscribe as a stream. Events lost to lagging are skipped.
    pub fn stream(&self) -> impl Stream<Item = LaunchEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|result| match result {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Subscriber lagging, skipping events: {}", e);
                None
            }
        })
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcaster_creation() {
        let broadcaster = EventBroadcaster::new(10);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_event() {
        let broadcaster = EventBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);

        broadcaster.broadcast(LaunchEvent::Eos { launch_id: 4 });
        assert_eq!(rx.recv().await.unwrap(), LaunchEvent::Eos { launch_id: 4 });
    }

    #[tokio::test]
    async fn test_stream_skips_lagged_events() {
        let broadcaster = EventBroadcaster::new(2);
        let stream = broadcaster.stream();
        tokio::pin!(stream);

        for launch_id in 1..=4 {
            broadcaster.broadcast(LaunchEvent::Closed { launch_id });
        }
        drop(broadcaster);

        // The first two were overwritten before anyone read them
        let received: Vec<_> = stream.map(|event| event.launch_id()).collect().await;
        assert_eq!(received, vec![3, 4]);
    }
}
