use crate::error::CaptureError;
use crate::types::CaptureResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Notifications emitted by a capture session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session moved into a new state
    StateChanged {
        state: &'static str,
        timestamp: DateTime<Utc>,
    },
    /// A capture attempt finished with a normalized result
    Captured { result: CaptureResult },
    /// The in-flight request was abandoned
    Cancelled { timestamp: DateTime<Utc> },
    /// A capture attempt failed
    Failed { error: CaptureError },
}

impl SessionEvent {
    pub fn state_changed(state: &'static str) -> Self {
        SessionEvent::StateChanged {
            state,
            timestamp: Utc::now(),
        }
    }

    pub fn cancelled() -> Self {
        SessionEvent::Cancelled {
            timestamp: Utc::now(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::StateChanged { .. } => "state_changed",
            SessionEvent::Captured { .. } => "captured",
            SessionEvent::Cancelled { .. } => "cancelled",
            SessionEvent::Failed { .. } => "failed",
        }
    }

    /// Whether this event ends a capture request
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionEvent::StateChanged { .. })
    }

    pub fn description(&self) -> String {
        match self {
            SessionEvent::StateChanged { state, .. } => format!("Session entered {}", state),
            SessionEvent::Captured { result } => format!(
                "Captured {} via {} ({} bytes encoded)",
                result.modality,
                result.source_transport,
                result.canonical_encoding.len()
            ),
            SessionEvent::Cancelled { .. } => "Capture cancelled".to_string(),
            SessionEvent::Failed { error } => format!("Capture failed: {}", error),
        }
    }
}

/// Broadcast fan-out of session events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish to all current subscribers, returning how many received it
    pub fn publish(&self, event: SessionEvent) -> usize {
        match &event {
            SessionEvent::Captured { .. } => info!("{}", event.description()),
            SessionEvent::Failed { .. } => warn!("{}", event.description()),
            SessionEvent::Cancelled { .. } => info!("{}", event.description()),
            SessionEvent::StateChanged { .. } => debug!("{}", event.description()),
        }

        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("No subscribers for session event");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureErrorKind;
    use crate::types::{Modality, Transport};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let bus = EventBus::new(8);
        let mut receiver = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.publish(SessionEvent::state_changed("detecting")), 1);

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "state_changed");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(SessionEvent::cancelled()), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let error = CaptureError::new(CaptureErrorKind::SensorBusy, "busy", true);
        assert_eq!(bus.publish(SessionEvent::Failed { error: error.clone() }), 2);

        assert_eq!(first.recv().await.unwrap(), SessionEvent::Failed { error: error.clone() });
        assert_eq!(second.recv().await.unwrap(), SessionEvent::Failed { error });
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let result = CaptureResult {
            modality: Modality::Face,
            canonical_encoding: "AAAA".to_string(),
            source_transport: Transport::Camera,
            captured_at: Utc::now(),
        };
        let event = SessionEvent::Captured { result };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "captured");
        assert_eq!(json["result"]["sourceTransport"], "camera");
        assert!(event.is_terminal());
    }
}
