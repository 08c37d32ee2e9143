// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain events published on the in-process event bus (§4.1-§4.7) and
//! mirrored into the audit trail by the finalizer (§4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::control_plane::WorkflowId;

/// Control-plane lifecycle events: creation, state transitions, leasing,
/// readiness propagation and finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlPlaneEvent {
    ControlPlaneCreated {
        workflow_id: WorkflowId,
        workflow_name: String,
        at: DateTime<Utc>,
    },
    StateUpdated {
        workflow_id: WorkflowId,
        state: String,
        status: String,
        at: DateTime<Utc>,
    },
    LeaseAcquired {
        workflow_id: WorkflowId,
        state: String,
        owner_agent_id: String,
        token: uuid::Uuid,
        at: DateTime<Utc>,
    },
    LeaseRenewed {
        workflow_id: WorkflowId,
        state: String,
        token: uuid::Uuid,
        at: DateTime<Utc>,
    },
    LeaseReleased {
        workflow_id: WorkflowId,
        state: String,
        at: DateTime<Utc>,
    },
    ReadinessNotificationSent {
        workflow_id: WorkflowId,
        from_state: String,
        to_state: String,
        at: DateTime<Utc>,
    },
    ReadinessNotificationSkipped {
        workflow_id: WorkflowId,
        to_state: String,
        reason: String,
        at: DateTime<Utc>,
    },
    WorkflowFinalized {
        workflow_id: WorkflowId,
        total_cost: Option<f64>,
        at: DateTime<Utc>,
    },
}

/// Session/companion coordination events (§4.7, "DCF+").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionContextCreated {
        session_id: String,
        at: DateTime<Utc>,
    },
    CompanionCreated {
        session_id: String,
        companion_id: String,
        specialization: String,
        at: DateTime<Utc>,
    },
    CompanionStatusUpdated {
        session_id: String,
        companion_id: String,
        status: String,
        at: DateTime<Utc>,
    },
    TaskDelegated {
        session_id: String,
        companion_id: String,
        task_id: String,
        at: DateTime<Utc>,
    },
    TaskBroadcast {
        session_id: String,
        task_id: String,
        recipient_count: usize,
        at: DateTime<Utc>,
    },
    CompanionDismissed {
        session_id: String,
        companion_id: String,
        at: DateTime<Utc>,
    },
    SessionFinalized {
        session_id: String,
        at: DateTime<Utc>,
    },
}

/// Top-level envelope carried on the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum DomainEvent {
    ControlPlane(ControlPlaneEvent),
    Session(SessionEvent),
}
