// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Event Bus — in-process pub/sub for domain events, backing the audit
//! trail the finalizer writes (§4.6) and any future streaming surface.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::domain::events::{ControlPlaneEvent, DomainEvent, SessionEvent};

const DEFAULT_CAPACITY: usize = 1000;

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender: Arc::new(sender) }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    pub fn publish_control_plane(&self, event: ControlPlaneEvent) {
        self.publish(DomainEvent::ControlPlane(event));
    }

    pub fn publish_session(&self, event: SessionEvent) {
        self.publish(DomainEvent::Session(event));
    }

    fn publish(&self, event: DomainEvent) {
        // No subscribers is not an error: the bus is best-effort broadcast.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscribe_workflow(&self, workflow_id: crate::domain::control_plane::WorkflowId) -> WorkflowEventReceiver {
        WorkflowEventReceiver {
            receiver: self.sender.subscribe(),
            workflow_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("event bus closed")]
    Closed,
    #[error("no events available")]
    Empty,
    #[error("receiver lagged, {0} events dropped")]
    Lagged(u64),
}

impl From<broadcast::error::RecvError> for EventBusError {
    fn from(err: broadcast::error::RecvError) -> Self {
        match err {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => EventBusError::Lagged(n),
        }
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(Into::into)
    }
}

/// Filters the bus down to events for a single workflow id.
pub struct WorkflowEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    workflow_id: crate::domain::control_plane::WorkflowId,
}

impl WorkflowEventReceiver {
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    fn matches(&self, event: &DomainEvent) -> bool {
        matches!(event,
            DomainEvent::ControlPlane(
                ControlPlaneEvent::ControlPlaneCreated { workflow_id, .. }
                | ControlPlaneEvent::StateUpdated { workflow_id, .. }
                | ControlPlaneEvent::LeaseAcquired { workflow_id, .. }
                | ControlPlaneEvent::LeaseRenewed { workflow_id, .. }
                | ControlPlaneEvent::LeaseReleased { workflow_id, .. }
                | ControlPlaneEvent::ReadinessNotificationSent { workflow_id, .. }
                | ControlPlaneEvent::ReadinessNotificationSkipped { workflow_id, .. }
                | ControlPlaneEvent::WorkflowFinalized { workflow_id, .. }
            ) if *workflow_id == self.workflow_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::control_plane::WorkflowId;

    #[tokio::test]
    async fn publish_then_subscribe_receives_event() {
        let bus = EventBus::with_default_capacity();
        let mut receiver = bus.subscribe();
        let workflow_id = WorkflowId::new();
        bus.publish_control_plane(ControlPlaneEvent::ControlPlaneCreated {
            workflow_id,
            workflow_name: "demo".into(),
            at: chrono::Utc::now(),
        });
        let event = receiver.recv().await.unwrap();
        assert!(matches!(event, DomainEvent::ControlPlane(ControlPlaneEvent::ControlPlaneCreated { .. })));
    }

    #[tokio::test]
    async fn workflow_filter_ignores_other_workflows() {
        let bus = EventBus::with_default_capacity();
        let target = WorkflowId::new();
        let mut receiver = bus.subscribe_workflow(target);

        bus.publish_control_plane(ControlPlaneEvent::ControlPlaneCreated {
            workflow_id: WorkflowId::new(),
            workflow_name: "other".into(),
            at: chrono::Utc::now(),
        });
        bus.publish_control_plane(ControlPlaneEvent::ControlPlaneCreated {
            workflow_id: target,
            workflow_name: "mine".into(),
            at: chrono::Utc::now(),
        });

        let event = receiver.recv().await.unwrap();
        match event {
            DomainEvent::ControlPlane(ControlPlaneEvent::ControlPlaneCreated { workflow_id, .. }) => {
                assert_eq!(workflow_id, target);
            }
            _ => panic!("unexpected event"),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive() {
        let bus = EventBus::with_default_capacity();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish_session(SessionEvent::SessionContextCreated {
            session_id: "s1".into(),
            at: chrono::Utc::now(),
        });
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }
}
