// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Workflow Bootstrap (§4.3): materializes worker agents from a validated
//! `WorkflowDefinition` and seeds the control plane.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::application::control_plane_service::ControlPlaneService;
use crate::domain::control_plane::{Deps, StateName, WorkflowId, WorkflowMeta};
use crate::domain::errors::{ErrorKind, RuntimeError, StoreError};
use crate::domain::repository::{AgentRuntime, AgentSpec};
use crate::domain::workflow::{State, WorkflowDefinition};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("invalid state name: {0}")]
    InvalidStateName(String),
}

impl BootstrapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BootstrapError::Store(e) => e.kind(),
            BootstrapError::Runtime(e) => e.kind(),
            BootstrapError::InvalidStateName(_) => ErrorKind::InvalidInput,
        }
    }
}

pub struct WorkflowBootstrap {
    control_plane: Arc<ControlPlaneService>,
    runtime: Arc<dyn AgentRuntime>,
}

impl WorkflowBootstrap {
    pub fn new(control_plane: Arc<ControlPlaneService>, runtime: Arc<dyn AgentRuntime>) -> Self {
        Self { control_plane, runtime }
    }

    /// Creates one worker agent per `Task` state, then seeds `WorkflowMeta`
    /// with the resulting `state -> agent_id` map and dependency edges.
    pub async fn bootstrap(
        &self,
        workflow_id: WorkflowId,
        workflow_name: &str,
        definition_version: &str,
        session_id: Option<String>,
        definition: &WorkflowDefinition,
    ) -> Result<WorkflowMeta, BootstrapError> {
        let mut agents = HashMap::new();

        for (name, state) in &definition.states {
            let State::Task { agent, .. } = state else { continue };
            StateName::new(name.clone()).map_err(BootstrapError::InvalidStateName)?;

            let agent_id = self
                .runtime
                .create_agent(AgentSpec {
                    template_name: agent.agent_template.clone(),
                    name: format!("{workflow_name}-{name}"),
                    tags: vec![
                        format!("workflow_id:{workflow_id}"),
                        format!("state:{name}"),
                    ],
                    memory_blocks: vec![(
                        "task_context".to_string(),
                        serde_json::json!({"workflow_id": workflow_id.to_string(), "state": name}),
                    )],
                })
                .await?;

            for skill in &agent.skills {
                self.runtime.attach_tool(&agent_id, skill).await?;
            }

            agents.insert(name.clone(), agent_id);
        }

        let edges = definition.task_dependency_edges();
        let mut deps = HashMap::new();
        for (name, (upstream, downstream)) in edges {
            if !agents.contains_key(&name) {
                continue;
            }
            deps.insert(
                name,
                Deps {
                    upstream: upstream
                        .into_iter()
                        .filter(|u| agents.contains_key(u))
                        .map(|u| StateName::new(u).expect("already-validated state name"))
                        .collect(),
                    downstream: downstream
                        .into_iter()
                        .filter(|d| agents.contains_key(d))
                        .map(|d| StateName::new(d).expect("already-validated state name"))
                        .collect(),
                },
            );
        }

        let now = Utc::now();
        let meta = WorkflowMeta {
            workflow_id,
            workflow_name: workflow_name.to_string(),
            definition_version: definition_version.to_string(),
            session_id,
            agents,
            planner_agent_id: None,
            deps,
            created_at: now,
            updated_at: now,
            finalized_at: None,
            status: None,
            finalize_note: None,
            cost_summary: None,
        };

        Ok(self.control_plane.create_control_plane(meta).await?)
    }
}
