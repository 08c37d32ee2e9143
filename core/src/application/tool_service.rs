// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Tool Surface dispatch (§4.8): typed functions behind the JSON-RPC-like
//! tool calls the presentation layer exposes over HTTP. Tool handlers never
//! panic; every error is mapped to `{ok: false, error_kind, message}`.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::application::bootstrap::WorkflowBootstrap;
use crate::application::control_plane_service::ControlPlaneService;
use crate::application::finalizer::Finalizer;
use crate::application::lease_manager::{AcquireOptions, LeaseManager};
use crate::application::readiness::ReadinessNotifier;
use crate::application::validator::WorkflowValidator;
use crate::domain::control_plane::{StateStatus, WorkflowId};
use crate::domain::errors::ErrorKind;

/// Result envelope every tool call returns, success or failure.
#[derive(Debug, Serialize)]
pub struct ToolResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    fn ok(data: Value) -> Value {
        serde_json::to_value(ToolResult {
            ok: true,
            error_kind: None,
            message: None,
            data: Some(data),
        })
        .expect("ToolResult always serializes")
    }

    fn error(kind: ErrorKind, message: impl std::fmt::Display) -> Value {
        serde_json::to_value(ToolResult {
            ok: false,
            error_kind: Some(kind.as_str()),
            message: Some(message.to_string()),
            data: None,
        })
        .expect("ToolResult always serializes")
    }
}

pub struct ToolService {
    pub control_plane: Arc<ControlPlaneService>,
    pub lease_manager: Arc<LeaseManager>,
    pub bootstrap: Arc<WorkflowBootstrap>,
    pub readiness: Arc<ReadinessNotifier>,
    pub validator: Arc<WorkflowValidator>,
    pub finalizer: Arc<Finalizer>,
}

impl ToolService {
    pub async fn validate_workflow(&self, manifest: &Value) -> Value {
        let report = self.validator.validate(manifest).await;
        ToolResult::ok(json!(report))
    }

    pub async fn create_control_plane(&self, workflow_id: WorkflowId, workflow_name: &str, definition_version: &str, session_id: Option<String>, definition: &crate::domain::workflow::WorkflowDefinition) -> Value {
        match self
            .bootstrap
            .bootstrap(workflow_id, workflow_name, definition_version, session_id, definition)
            .await
        {
            Ok(meta) => ToolResult::ok(json!(meta)),
            Err(e) => ToolResult::error(e.kind(), e),
        }
    }

    pub async fn read_control_plane(&self, workflow_id: WorkflowId) -> Value {
        match self.control_plane.read_meta(workflow_id).await {
            Ok(Some(meta)) => ToolResult::ok(json!(meta)),
            Ok(None) => ToolResult::error(ErrorKind::NotFound, "workflow not found"),
            Err(e) => ToolResult::error(e.kind(), e),
        }
    }

    pub async fn acquire_state_lease(&self, workflow_id: WorkflowId, state: &str, owner_agent_id: &str) -> Value {
        match self
            .lease_manager
            .acquire(workflow_id, state, owner_agent_id, AcquireOptions::default())
            .await
        {
            Ok(lease) => ToolResult::ok(json!(lease)),
            Err(e) => ToolResult::error(e.kind(), e),
        }
    }

    pub async fn renew_state_lease(&self, workflow_id: WorkflowId, state: &str, token: uuid::Uuid) -> Value {
        match self.lease_manager.renew(workflow_id, state, token).await {
            Ok(lease) => ToolResult::ok(json!(lease)),
            Err(e) => ToolResult::error(e.kind(), e),
        }
    }

    /// Sets the state's terminal status, then releases its lease. The
    /// lease manager itself never touches `status` (§4.2); the caller
    /// orders the two writes.
    pub async fn release_state_lease(&self, workflow_id: WorkflowId, state: &str, token: uuid::Uuid, final_status: StateStatus) -> Value {
        if let Err(e) = self
            .control_plane
            .update_state(workflow_id, state, move |mut doc| {
                doc.status = final_status;
                doc.completed_at = Some(chrono::Utc::now());
                Ok(doc)
            })
            .await
        {
            return ToolResult::error(e.kind(), e);
        }
        match self.lease_manager.release(workflow_id, state, token).await {
            Ok(()) => ToolResult::ok(json!({"released": true})),
            Err(e) => ToolResult::error(e.kind(), e),
        }
    }

    pub async fn notify_if_ready(&self, workflow_id: WorkflowId, from_state: &str, to_state: &str) -> Value {
        match self.readiness.notify_if_ready(workflow_id, from_state, to_state).await {
            Ok(outcome) => ToolResult::ok(json!({"outcome": format!("{outcome:?}")})),
            Err(e) => ToolResult::error(e.kind(), e),
        }
    }

    pub async fn finalize_workflow(
        &self,
        workflow_id: WorkflowId,
        close_open_states: bool,
        overall_status: Option<crate::domain::control_plane::WorkflowStatus>,
        preserve_planner: bool,
    ) -> Value {
        let options = crate::application::finalizer::FinalizeOptions {
            close_open_states,
            overall_status,
            preserve_planner,
        };
        match self.finalizer.finalize(workflow_id, options).await {
            Ok(summary) => ToolResult::ok(json!({
                "closed_states": summary.closed_states,
                "deleted_agents": summary.deleted_agents,
                "already_finalized": summary.already_finalized,
                "status": summary.status,
                "cost_summary": summary.cost_summary,
            })),
            Err(e) => ToolResult::error(e.kind(), e),
        }
    }
}
