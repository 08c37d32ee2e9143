// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Session-coordination domain types (§3.6-§3.8, §4.7 "DCF+"): a conductor
//! agent's session context, the companions working within it, and the log
//! of tasks delegated between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use choreo_core::domain::errors::ErrorKind;

/// `cp:session:{sid}` — the conductor's working context (§3.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    pub conductor_id: String,
    pub guidelines: Option<String>,
    pub context: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, conductor_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            conductor_id: conductor_id.into(),
            guidelines: None,
            context: serde_json::json!({}),
            created_at: now,
            updated_at: now,
            finalized_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanionStatus {
    Idle,
    Busy,
    Error,
}

/// A companion agent's status and assignment within a session (§3.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionMetadata {
    pub session_id: String,
    pub companion_id: String,
    /// Always `"companion"`; carried explicitly because it is projected
    /// onto the agent-runtime's tag set, which has no schema of its own.
    pub role: String,
    pub specialization: String,
    pub status: CompanionStatus,
    pub conductor_id: String,
    pub current_task_id: Option<String>,
}

impl CompanionMetadata {
    pub fn new(session_id: impl Into<String>, companion_id: impl Into<String>, specialization: impl Into<String>, conductor_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            companion_id: companion_id.into(),
            role: "companion".to_string(),
            specialization: specialization.into(),
            status: CompanionStatus::Idle,
            conductor_id: conductor_id.into(),
            current_task_id: None,
        }
    }

    /// Projects this record onto the tag set the agent-runtime adapter
    /// attaches to a companion agent at creation time.
    pub fn to_tags(&self) -> Vec<String> {
        vec![
            format!("session_id:{}", self.session_id),
            "role:companion".to_string(),
            format!("specialization:{}", self.specialization),
            format!("conductor_id:{}", self.conductor_id),
        ]
    }
}

/// A single task delegation or broadcast, recorded for session activity
/// reads (§3.7, §4.7 "readSessionActivity").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationRecord {
    pub task_id: String,
    pub session_id: String,
    pub companion_id: String,
    pub payload: serde_json::Value,
    pub delegated_at: DateTime<Utc>,
    pub result: Option<serde_json::Value>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// `cp:session:{sid}:delegations` — the append-only delegation log (§3.7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelegationLog {
    pub records: Vec<DelegationRecord>,
}

impl DelegationLog {
    pub fn push(&mut self, record: DelegationRecord) {
        self.records.push(record);
    }

    pub fn complete(&mut self, task_id: &str, result: serde_json::Value) -> bool {
        if let Some(record) = self.records.iter_mut().find(|r| r.task_id == task_id && r.completed_at.is_none()) {
            record.result = Some(result);
            record.completed_at = Some(Utc::now());
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("companion not found: {0}")]
    CompanionNotFound(String),
    #[error("session already finalized")]
    AlreadyFinalized,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Store(#[from] choreo_core::domain::errors::StoreError),
    #[error(transparent)]
    Runtime(#[from] choreo_core::domain::errors::RuntimeError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::NotFound(_) | SessionError::CompanionNotFound(_) => ErrorKind::NotFound,
            SessionError::AlreadyFinalized => ErrorKind::Conflict,
            SessionError::InvalidRequest(_) => ErrorKind::InvalidInput,
            SessionError::Store(e) => e.kind(),
            SessionError::Runtime(e) => e.kind(),
        }
    }
}
