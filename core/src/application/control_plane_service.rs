// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Control-Plane Store (§4.1): atomic CAS JSON operations over
//! `WorkflowMeta` and `StateDoc`.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::domain::control_plane::{StateDoc, StateStatus, WorkflowId, WorkflowMeta};
use crate::domain::errors::StoreError;
use crate::domain::events::ControlPlaneEvent;
use crate::domain::repository::DocumentStore;
use crate::infrastructure::event_bus::EventBus;

pub fn meta_key(workflow_id: WorkflowId) -> String {
    format!("cp:wf:{workflow_id}:meta")
}

pub fn state_key(workflow_id: WorkflowId, state: &str) -> String {
    format!("cp:wf:{workflow_id}:state:{state}")
}

pub fn output_key(workflow_id: WorkflowId, state: &str) -> String {
    format!("cp:wf:{workflow_id}:output:{state}")
}

pub struct ControlPlaneService {
    store: Arc<dyn DocumentStore>,
    events: EventBus,
}

impl ControlPlaneService {
    pub fn new(store: Arc<dyn DocumentStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Creates the control plane for a workflow instance. Idempotent: a
    /// second call with the same `workflow_id` returns the existing meta
    /// document unchanged (§8: idempotent createControlPlane).
    pub async fn create_control_plane(&self, meta: WorkflowMeta) -> Result<WorkflowMeta, StoreError> {
        let key = meta_key(meta.workflow_id);
        if let Some(existing) = self.store.get(&key).await? {
            return Ok(serde_json::from_value(existing)?);
        }

        let value = serde_json::to_value(&meta)?;
        self.store.set(&key, &value).await?;

        for state in meta.agents.keys() {
            let state_doc = StateDoc::new(meta.workflow_id, crate::domain::control_plane::StateName::new(state.clone())
                .map_err(StoreError::InvalidInput)?);
            let state_key = state_key(meta.workflow_id, state);
            self.store.set(&state_key, &serde_json::to_value(&state_doc)?).await?;
        }

        self.events.publish_control_plane(ControlPlaneEvent::ControlPlaneCreated {
            workflow_id: meta.workflow_id,
            workflow_name: meta.workflow_name.clone(),
            at: Utc::now(),
        });

        Ok(meta)
    }

    pub async fn read_meta(&self, workflow_id: WorkflowId) -> Result<Option<WorkflowMeta>, StoreError> {
        match self.store.get(&meta_key(workflow_id)).await? {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    pub async fn read_state(&self, workflow_id: WorkflowId, state: &str) -> Result<Option<StateDoc>, StoreError> {
        match self.store.get(&state_key(workflow_id, state)).await? {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    /// Atomically applies `patch` to the `StateDoc` at `state`, retrying the
    /// caller with [`StoreError::Conflict`] on a concurrent write (§4.1).
    pub async fn update_state<F>(&self, workflow_id: WorkflowId, state: &str, patch: F) -> Result<StateDoc, StoreError>
    where
        F: FnOnce(StateDoc) -> Result<StateDoc, StoreError> + Send + 'static,
    {
        let key = state_key(workflow_id, state);
        let state_owned = state.to_string();
        let wf_id = workflow_id;
        let result = self
            .store
            .compare_and_swap(
                &key,
                Box::new(move |current: Option<Value>| -> Result<Value, StoreError> {
                    let doc: StateDoc = match current {
                        Some(v) => serde_json::from_value(v)?,
                        None => StateDoc::new(wf_id, crate::domain::control_plane::StateName::new(state_owned.clone()).map_err(StoreError::InvalidInput)?),
                    };
                    let updated = patch(doc)?;
                    Ok(serde_json::to_value(updated)?)
                }),
            )
            .await?;

        let doc: StateDoc = serde_json::from_value(result)?;
        self.events.publish_control_plane(ControlPlaneEvent::StateUpdated {
            workflow_id,
            state: state.to_string(),
            status: format!("{:?}", doc.status).to_lowercase(),
            at: Utc::now(),
        });
        Ok(doc)
    }

    pub async fn write_output(&self, workflow_id: WorkflowId, state: &str, value: Value) -> Result<(), StoreError> {
        let output = crate::domain::control_plane::OutputDoc {
            workflow_id,
            state: crate::domain::control_plane::StateName::new(state.to_string()).map_err(StoreError::InvalidInput)?,
            value,
            produced_at: Utc::now(),
        };
        self.store.set(&output_key(workflow_id, state), &serde_json::to_value(&output)?).await
    }

    /// Whether `state`'s declared upstream states have all completed and it
    /// has not itself entered a non-`pending` status (§4.4 readiness
    /// predicate, "succeeded" canonical / "done" legacy alias). Gating on
    /// the target's own status prevents re-acquiring a state that already
    /// ran and was released (§9: source states ready only while `pending`).
    pub async fn is_ready(&self, workflow_id: WorkflowId, state: &str) -> Result<bool, StoreError> {
        let Some(meta) = self.read_meta(workflow_id).await? else {
            return Ok(false);
        };
        let still_pending = match self.read_state(workflow_id, state).await? {
            Some(doc) => doc.status == StateStatus::Pending,
            None => true,
        };
        if !still_pending {
            return Ok(false);
        }
        let Some(deps) = meta.deps.get(state) else {
            return Ok(true);
        };
        for upstream in &deps.upstream {
            match self.read_state(workflow_id, upstream.as_str()).await? {
                Some(doc) if doc.status.is_complete() => continue,
                _ => return Ok(false),
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::control_plane::Deps;
    use crate::infrastructure::memory_store::InMemoryDocumentStore;
    use std::collections::HashMap;

    fn service() -> ControlPlaneService {
        ControlPlaneService::new(Arc::new(InMemoryDocumentStore::new()), EventBus::with_default_capacity())
    }

    fn meta(workflow_id: WorkflowId) -> WorkflowMeta {
        let mut agents = HashMap::new();
        agents.insert("a".to_string(), "agent-1".to_string());
        agents.insert("b".to_string(), "agent-2".to_string());
        let mut deps = HashMap::new();
        deps.insert(
            "b".to_string(),
            Deps {
                upstream: vec![crate::domain::control_plane::StateName::new("a").unwrap()],
                downstream: vec![],
            },
        );
        WorkflowMeta {
            workflow_id,
            workflow_name: "demo".into(),
            definition_version: "1".into(),
            session_id: None,
            agents,
            planner_agent_id: None,
            deps,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            finalized_at: None,
            status: None,
            finalize_note: None,
            cost_summary: None,
        }
    }

    #[tokio::test]
    async fn create_control_plane_is_idempotent() {
        let svc = service();
        let wf = WorkflowId::new();
        let first = svc.create_control_plane(meta(wf)).await.unwrap();
        let second = svc.create_control_plane(meta(wf)).await.unwrap();
        assert_eq!(first.workflow_id, second.workflow_id);
    }

    #[tokio::test]
    async fn state_not_ready_until_upstream_completes() {
        let svc = service();
        let wf = WorkflowId::new();
        svc.create_control_plane(meta(wf)).await.unwrap();
        assert!(!svc.is_ready(wf, "b").await.unwrap());

        svc.update_state(wf, "a", |mut doc| {
            doc.status = StateStatus::Succeeded;
            Ok(doc)
        })
        .await
        .unwrap();

        assert!(svc.is_ready(wf, "b").await.unwrap());
    }
}
