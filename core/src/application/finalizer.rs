// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Finalizer (§4.6): closes any still-open states, aggregates cost, deletes
//! the workflow's worker agents, and writes an audit record. Idempotent:
//! finalizing a workflow twice is a no-op the second time (§8).

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::application::control_plane_service::ControlPlaneService;
use crate::domain::control_plane::{AuditRecord, CostSummary, StateStatus, WorkflowId, WorkflowStatus};
use crate::domain::errors::{ErrorKind, RuntimeError, StoreError};
use crate::domain::events::ControlPlaneEvent;
use crate::domain::repository::{AgentRuntime, DocumentStore};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("workflow not found: {0}")]
    NotFound(WorkflowId),
}

impl FinalizeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FinalizeError::Store(e) => e.kind(),
            FinalizeError::Runtime(e) => e.kind(),
            FinalizeError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// Options a caller may supply to `finalize` (§4.6, §8 scenario 6).
#[derive(Debug, Clone)]
pub struct FinalizeOptions {
    /// Close every non-terminal state to `cancelled` before computing the
    /// final status.
    pub close_open_states: bool,
    /// Caller-supplied override for the workflow's final status. When
    /// `None`, the status is computed from state counts (§4.6 step 3).
    pub overall_status: Option<WorkflowStatus>,
    /// Skip deleting the agent named by `meta.planner_agent_id`.
    pub preserve_planner: bool,
}

impl FinalizeOptions {
    pub fn new() -> Self {
        Self {
            close_open_states: true,
            overall_status: None,
            preserve_planner: false,
        }
    }
}

impl Default for FinalizeOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct FinalizeSummary {
    pub workflow_id: WorkflowId,
    pub closed_states: Vec<String>,
    pub deleted_agents: Vec<String>,
    pub already_finalized: bool,
    pub status: Option<WorkflowStatus>,
    pub cost_summary: Option<CostSummary>,
}

pub struct Finalizer {
    control_plane: Arc<ControlPlaneService>,
    store: Arc<dyn DocumentStore>,
    runtime: Arc<dyn AgentRuntime>,
    events: EventBus,
}

impl Finalizer {
    pub fn new(control_plane: Arc<ControlPlaneService>, store: Arc<dyn DocumentStore>, runtime: Arc<dyn AgentRuntime>, events: EventBus) -> Self {
        Self { control_plane, store, runtime, events }
    }

    pub async fn finalize(&self, workflow_id: WorkflowId, options: FinalizeOptions) -> Result<FinalizeSummary, FinalizeError> {
        let mut meta = self
            .control_plane
            .read_meta(workflow_id)
            .await?
            .ok_or(FinalizeError::NotFound(workflow_id))?;

        if meta.finalized_at.is_some() {
            return Ok(FinalizeSummary {
                workflow_id,
                closed_states: Vec::new(),
                deleted_agents: Vec::new(),
                already_finalized: true,
                status: meta.status,
                cost_summary: meta.cost_summary,
            });
        }

        // Step 2: close every open state to `cancelled` before counting.
        let mut closed_states = Vec::new();
        if options.close_open_states {
            for state in meta.agents.keys() {
                let doc = self
                    .control_plane
                    .update_state(workflow_id, state, |mut doc| {
                        if !doc.status.is_terminal() {
                            doc.status = StateStatus::Cancelled;
                            doc.completed_at = Some(Utc::now());
                            doc.last_error = Some("finalized: state closed by finalize_workflow".to_string());
                        }
                        Ok(doc)
                    })
                    .await?;
                if doc.status == StateStatus::Cancelled {
                    closed_states.push(state.clone());
                }
            }
        }

        // Step 3: compute final status from current per-state counts.
        let mut failed = 0usize;
        let mut open = 0usize;
        let mut model_selections = Vec::new();
        for state in meta.agents.keys() {
            if let Some(doc) = self.control_plane.read_state(workflow_id, state).await? {
                if doc.status == StateStatus::Failed {
                    failed += 1;
                } else if !doc.status.is_terminal() {
                    open += 1;
                }
                if let Some(selection) = doc.model_selection.clone() {
                    model_selections.push((state.clone(), selection));
                }
            }
        }
        let status = options.overall_status.unwrap_or_else(|| {
            if failed > 0 {
                WorkflowStatus::Failed
            } else if open > 0 {
                WorkflowStatus::Partial
            } else {
                WorkflowStatus::Succeeded
            }
        });

        // Step 4: delete worker agents, preserving the planner on request.
        let mut deleted_agents = Vec::new();
        for agent_id in meta.agents.values() {
            if options.preserve_planner && meta.planner_agent_id.as_deref() == Some(agent_id.as_str()) {
                continue;
            }
            self.runtime.delete_agent(agent_id).await?;
            deleted_agents.push(agent_id.clone());
        }

        // Step 5: aggregate cost/token accounting from each state's metrics.
        let cost_summary = self.aggregate_cost(workflow_id, meta.agents.keys()).await?;

        // Step 6: persist the computed status onto meta.
        meta.status = Some(status);
        meta.finalize_note = Some(format!(
            "finalized with {failed} failed, {open} still open, {} cancelled",
            closed_states.len()
        ));
        meta.cost_summary = cost_summary.clone();
        meta.finalized_at = Some(Utc::now());
        meta.updated_at = Utc::now();
        let meta_value = serde_json::to_value(&meta).map_err(StoreError::from)?;
        self.store.set(&crate::application::control_plane_service::meta_key(workflow_id), &meta_value).await?;

        // Step 7: write the finalize audit record, and an amsp record when
        // any state carried model-selection data.
        let audit = AuditRecord {
            workflow_id,
            state: None,
            event: "workflow_finalized".to_string(),
            detail: serde_json::json!({
                "status": status,
                "closed_states": closed_states,
                "deleted_agents": deleted_agents,
                "cost_summary": cost_summary,
            }),
            recorded_at: Utc::now(),
        };
        let audit_value = serde_json::to_value(&audit).map_err(StoreError::from)?;
        self.store.set(&format!("dp:wf:{workflow_id}:audit:finalize"), &audit_value).await?;

        if !model_selections.is_empty() {
            let escalations = model_selections.iter().filter(|(_, sel)| sel.escalated).count();
            let amsp = AuditRecord {
                workflow_id,
                state: None,
                event: "workflow_model_selection".to_string(),
                detail: serde_json::json!({
                    "selections": model_selections.iter().map(|(state, sel)| serde_json::json!({
                        "state": state,
                        "tier": sel.tier,
                        "model": sel.model,
                        "fcs": sel.fcs,
                        "escalated": sel.escalated,
                    })).collect::<Vec<_>>(),
                    "escalation_rate": escalations as f64 / model_selections.len() as f64,
                }),
                recorded_at: Utc::now(),
            };
            let amsp_value = serde_json::to_value(&amsp).map_err(StoreError::from)?;
            self.store.set(&format!("dp:wf:{workflow_id}:audit:amsp"), &amsp_value).await?;
        }

        self.events.publish_control_plane(ControlPlaneEvent::WorkflowFinalized {
            workflow_id,
            total_cost: cost_summary.as_ref().map(|c| c.total_estimated_cost_usd),
            at: Utc::now(),
        });

        Ok(FinalizeSummary {
            workflow_id,
            closed_states,
            deleted_agents,
            already_finalized: false,
            status: Some(status),
            cost_summary,
        })
    }

    /// Sums `execution_metrics` across every state and buckets
    /// `estimated_cost_usd` by `model_selection.tier` (§4.6 step 5).
    async fn aggregate_cost<'a>(&self, workflow_id: WorkflowId, states: impl Iterator<Item = &'a String>) -> Result<Option<CostSummary>, StoreError> {
        let mut summary = CostSummary::default();
        let mut found = false;
        for state in states {
            let Some(doc) = self.control_plane.read_state(workflow_id, state).await? else {
                continue;
            };
            let Some(metrics) = doc.execution_metrics else {
                continue;
            };
            found = true;
            summary.total_tokens += metrics.total_tokens;
            summary.prompt_tokens += metrics.prompt_tokens;
            summary.completion_tokens += metrics.completion_tokens;
            summary.llm_calls += metrics.llm_calls;
            summary.tool_calls += metrics.tool_calls;
            summary.duration_ms += metrics.duration_ms;
            summary.total_estimated_cost_usd += metrics.estimated_cost_usd;

            if let Some(selection) = doc.model_selection {
                *summary.cost_by_tier.entry(selection.tier.to_string()).or_insert(0.0) += metrics.estimated_cost_usd;
                if selection.escalated {
                    summary.tier_escalations += 1;
                }
            }
        }
        Ok(found.then_some(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::control_plane::{ExecutionMetrics, ModelSelection};
    use crate::domain::repository::{AgentMessageResult, AgentSpec};
    use crate::infrastructure::memory_store::InMemoryDocumentStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRuntime {
        deletes: AtomicUsize,
    }

    #[async_trait]
    impl AgentRuntime for StubRuntime {
        async fn create_agent(&self, _spec: AgentSpec) -> Result<String, RuntimeError> {
            Ok("agent-x".to_string())
        }
        async fn delete_agent(&self, _agent_id: &str) -> Result<(), RuntimeError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn attach_tool(&self, _agent_id: &str, _tool_name: &str) -> Result<(), RuntimeError> {
            Ok(())
        }
        async fn attach_memory_block(&self, _agent_id: &str, _label: &str, _value: &serde_json::Value) -> Result<(), RuntimeError> {
            Ok(())
        }
        async fn send_message(&self, _agent_id: &str, _role: &str, _content: &serde_json::Value) -> Result<AgentMessageResult, RuntimeError> {
            Ok(AgentMessageResult { message_id: Some("m1".into()), run_id: None })
        }
        async fn send_message_async(&self, _agent_id: &str, _role: &str, _content: &serde_json::Value) -> Result<AgentMessageResult, RuntimeError> {
            Ok(AgentMessageResult { message_id: None, run_id: Some("r1".into()) })
        }
    }

    fn setup() -> (Finalizer, Arc<ControlPlaneService>, WorkflowId) {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let events = EventBus::with_default_capacity();
        let control_plane = Arc::new(ControlPlaneService::new(store.clone(), events.clone()));
        let runtime: Arc<dyn AgentRuntime> = Arc::new(StubRuntime { deletes: AtomicUsize::new(0) });
        let finalizer = Finalizer::new(control_plane.clone(), store, runtime, events);
        (finalizer, control_plane, WorkflowId::new())
    }

    async fn seed(control_plane: &ControlPlaneService, workflow_id: WorkflowId) {
        seed_with_planner(control_plane, workflow_id, None).await;
    }

    async fn seed_with_planner(control_plane: &ControlPlaneService, workflow_id: WorkflowId, planner_agent_id: Option<String>) {
        let mut agents = HashMap::new();
        agents.insert("a".to_string(), "agent-1".to_string());
        agents.insert("b".to_string(), "agent-2".to_string());
        let meta = crate::domain::control_plane::WorkflowMeta {
            workflow_id,
            workflow_name: "demo".into(),
            definition_version: "1".into(),
            session_id: None,
            agents,
            planner_agent_id,
            deps: HashMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            finalized_at: None,
            status: None,
            finalize_note: None,
            cost_summary: None,
        };
        control_plane.create_control_plane(meta).await.unwrap();
    }

    #[tokio::test]
    async fn finalize_closes_open_states_and_deletes_agents() {
        let (finalizer, control_plane, workflow_id) = setup();
        seed(&control_plane, workflow_id).await;

        control_plane
            .update_state(workflow_id, "a", |mut doc| {
                doc.status = StateStatus::Succeeded;
                Ok(doc)
            })
            .await
            .unwrap();

        let summary = finalizer.finalize(workflow_id, FinalizeOptions::new()).await.unwrap();
        assert!(!summary.already_finalized);
        assert_eq!(summary.closed_states, vec!["b".to_string()]);
        assert_eq!(summary.deleted_agents.len(), 2);
        // "b" was open and got cancelled before the count, so no failures and
        // nothing left open -> succeeded (§4.6 step 3).
        assert_eq!(summary.status, Some(WorkflowStatus::Succeeded));

        let b = control_plane.read_state(workflow_id, "b").await.unwrap().unwrap();
        assert_eq!(b.status, StateStatus::Cancelled);
        assert_eq!(b.last_error.as_deref(), Some("finalized: state closed by finalize_workflow"));
    }

    #[tokio::test]
    async fn finalize_with_failed_state_reports_failed() {
        let (finalizer, control_plane, workflow_id) = setup();
        seed(&control_plane, workflow_id).await;

        control_plane
            .update_state(workflow_id, "a", |mut doc| {
                doc.status = StateStatus::Failed;
                Ok(doc)
            })
            .await
            .unwrap();

        let summary = finalizer.finalize(workflow_id, FinalizeOptions::new()).await.unwrap();
        assert_eq!(summary.status, Some(WorkflowStatus::Failed));
    }

    #[tokio::test]
    async fn finalize_without_closing_open_states_reports_partial() {
        let (finalizer, control_plane, workflow_id) = setup();
        seed(&control_plane, workflow_id).await;

        control_plane
            .update_state(workflow_id, "a", |mut doc| {
                doc.status = StateStatus::Succeeded;
                Ok(doc)
            })
            .await
            .unwrap();

        let opts = FinalizeOptions {
            close_open_states: false,
            ..FinalizeOptions::new()
        };
        let summary = finalizer.finalize(workflow_id, opts).await.unwrap();
        assert!(summary.closed_states.is_empty());
        assert_eq!(summary.status, Some(WorkflowStatus::Partial));
    }

    #[tokio::test]
    async fn finalize_preserves_planner_agent() {
        let (finalizer, control_plane, workflow_id) = setup();
        seed_with_planner(&control_plane, workflow_id, Some("agent-1".to_string())).await;

        let opts = FinalizeOptions {
            preserve_planner: true,
            ..FinalizeOptions::new()
        };
        let summary = finalizer.finalize(workflow_id, opts).await.unwrap();
        assert_eq!(summary.deleted_agents, vec!["agent-2".to_string()]);
    }

    #[tokio::test]
    async fn finalize_aggregates_cost_by_tier() {
        let (finalizer, control_plane, workflow_id) = setup();
        seed(&control_plane, workflow_id).await;

        for (state, tier, cost) in [("a", 1u8, 0.5_f64), ("b", 2u8, 1.5_f64)] {
            control_plane
                .update_state(workflow_id, state, move |mut doc| {
                    doc.status = StateStatus::Succeeded;
                    doc.execution_metrics = Some(ExecutionMetrics {
                        total_tokens: 100,
                        prompt_tokens: 60,
                        completion_tokens: 40,
                        llm_calls: 1,
                        tool_calls: 0,
                        duration_ms: 10,
                        estimated_cost_usd: cost,
                    });
                    doc.model_selection = Some(ModelSelection {
                        tier,
                        model: Some("test-model".to_string()),
                        fcs: Some(10.0),
                        escalated: tier == 2,
                    });
                    Ok(doc)
                })
                .await
                .unwrap();
        }

        let summary = finalizer.finalize(workflow_id, FinalizeOptions::new()).await.unwrap();
        let cost = summary.cost_summary.expect("cost summary present");
        assert_eq!(cost.total_tokens, 200);
        assert_eq!(cost.total_estimated_cost_usd, 2.0);
        assert_eq!(cost.cost_by_tier.get("1"), Some(&0.5));
        assert_eq!(cost.cost_by_tier.get("2"), Some(&1.5));
        assert_eq!(cost.tier_escalations, 1);
    }

    #[tokio::test]
    async fn finalize_twice_is_idempotent() {
        let (finalizer, control_plane, workflow_id) = setup();
        seed(&control_plane, workflow_id).await;

        let first = finalizer.finalize(workflow_id, FinalizeOptions::new()).await.unwrap();
        let second = finalizer.finalize(workflow_id, FinalizeOptions::new()).await.unwrap();
        assert!(!first.already_finalized);
        assert!(second.already_finalized);
        assert_eq!(second.status, first.status);
    }

    #[tokio::test]
    async fn finalize_unknown_workflow_errors() {
        let (finalizer, _control_plane, _workflow_id) = setup();
        let err = finalizer.finalize(WorkflowId::new(), FinalizeOptions::new()).await.unwrap_err();
        assert!(matches!(err, FinalizeError::NotFound(_)));
    }
}
