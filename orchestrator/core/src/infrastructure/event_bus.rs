// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Operation Progress
//
// In-memory event streaming using tokio broadcast channels. Events are lost
// on restart; the pending-operation bucket is the durable record.

use crate::domain::events::OperationEvent;
use crate::domain::ids::PendingOperationId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to operation events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<OperationEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish(&self, event: OperationEvent) {
        debug!("Publishing event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all operation events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of a single pending operation
    pub fn subscribe_operation(&self, op_id: PendingOperationId) -> OperationEventReceiver {
        OperationEventReceiver {
            receiver: self.sender.subscribe(),
            op_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all operation events
pub struct EventReceiver {
    receiver: broadcast::Receiver<OperationEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<OperationEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<OperationEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one pending operation
pub struct OperationEventReceiver {
    receiver: broadcast::Receiver<OperationEvent>,
    op_id: PendingOperationId,
}

impl OperationEventReceiver {
    pub async fn recv(&mut self) -> Result<OperationEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.op_id() == &self.op_id {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn built(op_id: &PendingOperationId) -> OperationEvent {
        OperationEvent::OperationBuilt {
            op_id: op_id.clone(),
            label: "Create Dirvolume".to_string(),
            built_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        let op_id = PendingOperationId::generate();

        event_bus.publish(built(&op_id));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.op_id(), &op_id);
        assert!(!received.is_terminal());
    }

    #[tokio::test]
    async fn test_operation_event_filtering() {
        let event_bus = EventBus::new(10);
        let op_id = PendingOperationId::generate();
        let mut receiver = event_bus.subscribe_operation(op_id.clone());

        event_bus.publish(built(&PendingOperationId::generate()));
        event_bus.publish(OperationEvent::OperationCompleted {
            op_id: op_id.clone(),
            label: "Create Dirvolume".to_string(),
            resource_url: "/dirvolumes/x".to_string(),
            completed_at: Utc::now(),
        });

        let received = receiver.recv().await.unwrap();
        match received {
            OperationEvent::OperationCompleted { op_id: id, .. } => assert_eq!(id, op_id),
            _ => panic!("Wrong event type received"),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish(built(&PendingOperationId::generate()));

        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
        assert!(matches!(receiver1.try_recv(), Err(EventBusError::Empty)));
    }
}
