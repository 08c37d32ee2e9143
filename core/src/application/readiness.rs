// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Readiness Evaluator & Notifier (§4.4): the choreography heartbeat. A
//! worker that finishes a state calls `notify_if_ready` for each downstream
//! state; this evaluates readiness and, if satisfied, sends a workflow event
//! envelope into that state's agent (§6.2).

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::application::control_plane_service::ControlPlaneService;
use crate::domain::control_plane::{StateStatus, WorkflowId};
use crate::domain::errors::{ErrorKind, RuntimeError, StoreError};
use crate::domain::events::ControlPlaneEvent;
use crate::domain::repository::AgentRuntime;
use crate::infrastructure::event_bus::EventBus;

/// Statuses that short-circuit notification: the downstream state is
/// already running, done, or failed, so a duplicate notify is a no-op
/// (§8: at-least-once delivery, idempotent via status checks).
const SKIP_IF_STATUS_IN: [StateStatus; 3] = [StateStatus::Running, StateStatus::Succeeded, StateStatus::Failed];

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ReadinessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReadinessError::Store(e) => e.kind(),
            ReadinessError::Runtime(e) => e.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    SkippedAlreadyStarted,
    SkippedNotReady,
}

pub struct ReadinessNotifier {
    control_plane: Arc<ControlPlaneService>,
    runtime: Arc<dyn AgentRuntime>,
    events: EventBus,
}

impl ReadinessNotifier {
    pub fn new(control_plane: Arc<ControlPlaneService>, runtime: Arc<dyn AgentRuntime>, events: EventBus) -> Self {
        Self { control_plane, runtime, events }
    }

    /// Evaluates readiness for `to_state` and, if ready and not already
    /// started, notifies its assigned agent with a workflow event envelope.
    pub async fn notify_if_ready(&self, workflow_id: WorkflowId, from_state: &str, to_state: &str) -> Result<NotifyOutcome, ReadinessError> {
        if let Some(doc) = self.control_plane.read_state(workflow_id, to_state).await? {
            if SKIP_IF_STATUS_IN.contains(&doc.status) {
                self.events.publish_control_plane(ControlPlaneEvent::ReadinessNotificationSkipped {
                    workflow_id,
                    to_state: to_state.to_string(),
                    reason: "already_started".to_string(),
                    at: Utc::now(),
                });
                return Ok(NotifyOutcome::SkippedAlreadyStarted);
            }
        }

        if !self.control_plane.is_ready(workflow_id, to_state).await? {
            self.events.publish_control_plane(ControlPlaneEvent::ReadinessNotificationSkipped {
                workflow_id,
                to_state: to_state.to_string(),
                reason: "not_ready".to_string(),
                at: Utc::now(),
            });
            return Ok(NotifyOutcome::SkippedNotReady);
        }

        let meta = self
            .control_plane
            .read_meta(workflow_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("workflow meta for {workflow_id}")))?;
        let agent_id = meta
            .agents
            .get(to_state)
            .ok_or_else(|| StoreError::NotFound(format!("no agent assigned to state {to_state}")))?;

        let envelope = self.build_event_envelope(workflow_id, Some(from_state), to_state, "notify_if_ready");
        self.runtime.send_message_async(agent_id, "system", &envelope).await?;

        self.events.publish_control_plane(ControlPlaneEvent::ReadinessNotificationSent {
            workflow_id,
            from_state: from_state.to_string(),
            to_state: to_state.to_string(),
            at: Utc::now(),
        });

        Ok(NotifyOutcome::Sent)
    }

    /// Notifies every downstream state of `from_state` in turn (§4.4
    /// "notifyNextWorkers").
    pub async fn notify_next_workers(&self, workflow_id: WorkflowId, from_state: &str) -> Result<Vec<(String, NotifyOutcome)>, ReadinessError> {
        let meta = self
            .control_plane
            .read_meta(workflow_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("workflow meta for {workflow_id}")))?;

        let mut outcomes = Vec::new();
        for (state, deps) in &meta.deps {
            if deps.upstream.iter().any(|u| u.as_str() == from_state) {
                let outcome = self.notify_if_ready(workflow_id, from_state, state).await?;
                outcomes.push((state.clone(), outcome));
            }
        }
        Ok(outcomes)
    }

    /// §6.2 Workflow Event Envelope.
    fn build_event_envelope(&self, workflow_id: WorkflowId, source_state: Option<&str>, target_state: &str, reason: &str) -> Value {
        json!({
            "type": "workflow_event",
            "workflow_id": workflow_id.to_string(),
            "target_state": target_state,
            "source_state": source_state,
            "reason": reason,
            "payload": Value::Null,
            "ts": Utc::now().to_rfc3339(),
            "control_plane": {
                "meta_key": crate::application::control_plane_service::meta_key(workflow_id),
                "state_key": crate::application::control_plane_service::state_key(workflow_id, target_state),
                "output_key": crate::application::control_plane_service::output_key(workflow_id, target_state),
            },
        })
    }
}
