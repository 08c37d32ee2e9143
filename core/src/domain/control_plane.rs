// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Control-plane document shapes (§3.1-§3.4): the JSON documents persisted in
//! the document store under the `cp:wf:{id}:*` key layout.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a running workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a state within a workflow definition's state machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateName(String);

impl StateName {
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("state name must not be empty".to_string());
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StateName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution status carried on a `StateDoc`. `Done` is accepted on read as a
/// legacy alias of `Succeeded` (§9 open question) but is never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateStatus {
    Pending,
    Running,
    Succeeded,
    #[serde(alias = "done")]
    Done,
    Failed,
    Cancelled,
}

impl StateStatus {
    /// Canonicalizes the legacy `done` alias to `succeeded` for comparisons.
    pub fn is_complete(&self) -> bool {
        matches!(self, StateStatus::Succeeded | StateStatus::Done)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StateStatus::Succeeded | StateStatus::Done | StateStatus::Failed | StateStatus::Cancelled
        )
    }
}

/// Workflow-wide outcome, computed once by finalize (§4.6 step 3): `failed`
/// wins over `partial`, which wins over `succeeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Succeeded,
    Failed,
    Partial,
}

/// Upstream/downstream adjacency for a single state, derived from the
/// workflow definition's `Next`/`Choice`/`Parallel`/`Map` edges at bootstrap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deps {
    pub upstream: Vec<StateName>,
    pub downstream: Vec<StateName>,
}

/// `cp:wf:{id}:meta` — workflow-wide control-plane metadata (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMeta {
    pub workflow_id: WorkflowId,
    pub workflow_name: String,
    pub definition_version: String,
    pub session_id: Option<String>,
    /// state -> agent id assigned to execute it
    pub agents: HashMap<String, String>,
    /// agent preserved across finalize rather than deleted, e.g. a planner
    #[serde(default)]
    pub planner_agent_id: Option<String>,
    /// state -> dependency edges
    pub deps: HashMap<String, Deps>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    /// Absent until finalize runs (§3.1: "Initially absent; set on finalize").
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    #[serde(default)]
    pub finalize_note: Option<String>,
    #[serde(default)]
    pub cost_summary: Option<CostSummary>,
}

/// `cp:wf:{id}:state:{state}` — per-state execution record (§3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDoc {
    pub workflow_id: WorkflowId,
    pub state: StateName,
    pub status: StateStatus,
    pub attempts: u32,
    pub lease: Option<Lease>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Model tier picked for this state by the complexity scorer (§4.9).
    #[serde(default)]
    pub model_selection: Option<ModelSelection>,
    /// Token/cost accounting reported by the worker on completion.
    #[serde(default)]
    pub execution_metrics: Option<ExecutionMetrics>,
}

impl StateDoc {
    pub fn new(workflow_id: WorkflowId, state: StateName) -> Self {
        Self {
            workflow_id,
            state,
            status: StateStatus::Pending,
            attempts: 0,
            lease: None,
            started_at: None,
            completed_at: None,
            last_error: None,
            model_selection: None,
            execution_metrics: None,
        }
    }
}

/// Per-state model-tier pick recorded for cost attribution (§4.6 step 5, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelection {
    pub tier: u8,
    pub model: Option<String>,
    pub fcs: Option<f64>,
    #[serde(default)]
    pub escalated: bool,
}

/// Per-state execution accounting, summed by finalize into `CostSummary`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub llm_calls: u64,
    #[serde(default)]
    pub tool_calls: u64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub estimated_cost_usd: f64,
}

/// Workflow-wide cost rollup written to `meta.cost_summary` by finalize
/// (§4.6 step 5), only when at least one state reported metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub llm_calls: u64,
    pub tool_calls: u64,
    pub duration_ms: u64,
    pub total_estimated_cost_usd: f64,
    /// model tier -> summed `estimated_cost_usd` across states at that tier
    pub cost_by_tier: HashMap<String, f64>,
    pub tier_escalations: u32,
}

/// Lease held against a state while a worker agent executes it (§3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub token: Uuid,
    pub owner_agent_id: String,
    pub ts: DateTime<Utc>,
    pub ttl_s: u64,
}

impl Lease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.ts).num_seconds() > self.ttl_s as i64
    }
}

/// `cp:wf:{id}:output:{state}` — the JSON output a worker produced (§3.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDoc {
    pub workflow_id: WorkflowId,
    pub state: StateName,
    pub value: serde_json::Value,
    pub produced_at: DateTime<Utc>,
}

/// A single entry in the finalize-time audit trail (§3.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub workflow_id: WorkflowId,
    pub state: Option<StateName>,
    pub event: String,
    pub detail: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_name_rejects_empty() {
        assert!(StateName::new("").is_err());
        assert!(StateName::new("  ").is_err());
        assert!(StateName::new("fetch").is_ok());
    }

    #[test]
    fn done_alias_is_complete() {
        assert!(StateStatus::Done.is_complete());
        assert!(StateStatus::Succeeded.is_complete());
        assert!(!StateStatus::Running.is_complete());
    }

    #[test]
    fn lease_expiry() {
        let lease = Lease {
            token: Uuid::new_v4(),
            owner_agent_id: "agent-1".into(),
            ts: Utc::now() - chrono::Duration::seconds(400),
            ttl_s: 300,
        };
        assert!(lease.is_expired(Utc::now()));
    }
}
