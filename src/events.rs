// Event types and the bus that carries them
//
// The bus is a plain value handed to whoever publishes or listens; a
// subscriber only sees events published after it subscribed.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::EVENT_CHANNEL_SIZE;
use crate::error::ErrorEvent;
use crate::pattern::MovementPattern;
use crate::servo::ServoConfiguration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum AppEvent {
    ServoUpdate(ServoConfiguration),
    PatternExecute(MovementPattern),
    PatternUpdate(MovementPattern),
    CodeGenerate,
    Error(ErrorEvent),
}

impl AppEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::ServoUpdate(_) => "servo:update",
            AppEvent::PatternExecute(_) => "pattern:execute",
            AppEvent::PatternUpdate(_) => "pattern:update",
            AppEvent::CodeGenerate => "code:generate",
            AppEvent::Error(_) => "error",
        }
    }
}

/// Broadcast bus for application events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CHANNEL_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers, returns how many received it
    pub fn publish(&self, event: AppEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!("Published {} to {} subscribers", name, receivers);
                receivers
            }
            // No subscribers is not an error
            Err(_) => 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ValidationError};

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish(AppEvent::CodeGenerate), 1);
        let err: Error = ValidationError::NoServos.into();
        bus.publish(AppEvent::Error(ErrorEvent::from(&err)));

        assert_eq!(rx.recv().await.unwrap(), AppEvent::CodeGenerate);
        match rx.recv().await.unwrap() {
            AppEvent::Error(event) => assert_eq!(event.message, err.to_string()),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(AppEvent::CodeGenerate), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        let _early = bus.subscribe();
        bus.publish(AppEvent::CodeGenerate);
        let mut late = bus.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn test_event_wire_shape() {
        let event = AppEvent::ServoUpdate(ServoConfiguration::new(2, "wrist"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "servo_update");
        assert_eq!(json["data"]["channel"], 2);
        assert_eq!(event.name(), "servo:update");
    }
}
