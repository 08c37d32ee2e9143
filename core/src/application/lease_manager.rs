// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Lease Manager (§4.2): acquire/renew/release over a `StateDoc`'s lease
//! field, grounded in the control plane's original WATCH/MULTI/EXEC
//! acquisition algorithm.

use chrono::Utc;
use uuid::Uuid;

use crate::application::control_plane_service::ControlPlaneService;
use crate::domain::control_plane::{Lease, StateStatus, WorkflowId};
use crate::domain::errors::StoreError;
use crate::domain::events::ControlPlaneEvent;
use crate::domain::repository::DocumentStore;
use crate::infrastructure::event_bus::EventBus;
use std::sync::Arc;

use crate::domain::errors::LeaseError;

const DEFAULT_LEASE_TTL_S: u64 = 300;

#[derive(Debug, Clone)]
pub struct AcquireOptions {
    pub lease_ttl_s: u64,
    pub require_ready: bool,
    pub require_owner_match: bool,
    pub allow_steal_if_expired: bool,
    pub set_running_on_acquire: bool,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            lease_ttl_s: DEFAULT_LEASE_TTL_S,
            require_ready: true,
            require_owner_match: true,
            allow_steal_if_expired: true,
            set_running_on_acquire: true,
        }
    }
}

pub struct LeaseManager {
    control_plane: Arc<ControlPlaneService>,
    store: Arc<dyn DocumentStore>,
    events: EventBus,
}

impl LeaseManager {
    pub fn new(control_plane: Arc<ControlPlaneService>, store: Arc<dyn DocumentStore>, events: EventBus) -> Self {
        Self { control_plane, store, events }
    }

    pub async fn acquire(
        &self,
        workflow_id: WorkflowId,
        state: &str,
        owner_agent_id: &str,
        opts: AcquireOptions,
    ) -> Result<Lease, LeaseError> {
        if opts.require_ready && !self.control_plane.is_ready(workflow_id, state).await? {
            return Err(LeaseError::NotReady);
        }

        if opts.require_owner_match {
            if let Some(meta) = self.control_plane.read_meta(workflow_id).await? {
                if let Some(assigned) = meta.agents.get(state) {
                    if assigned != owner_agent_id {
                        return Err(LeaseError::OwnerMismatch);
                    }
                }
            }
        }

        let owner = owner_agent_id.to_string();
        let key = crate::application::control_plane_service::state_key(workflow_id, state);
        let now = Utc::now();
        let ttl = opts.lease_ttl_s;
        let set_running = opts.set_running_on_acquire;
        let allow_steal = opts.allow_steal_if_expired;

        let result = self
            .store
            .compare_and_swap(
                &key,
                Box::new(move |current| -> Result<serde_json::Value, StoreError> {
                    let mut doc: crate::domain::control_plane::StateDoc = match current {
                        Some(v) => serde_json::from_value(v)?,
                        None => return Err(StoreError::NotFound(key_not_found_message())),
                    };

                    if let Some(existing) = &doc.lease {
                        let expired = existing.is_expired(now);
                        if !expired {
                            return Err(StoreError::InvalidInput("lease_held".to_string()));
                        }
                        if expired && !allow_steal {
                            return Err(StoreError::InvalidInput("lease_expired_no_steal".to_string()));
                        }
                    }

                    let lease = Lease {
                        token: Uuid::new_v4(),
                        owner_agent_id: owner.clone(),
                        ts: now,
                        ttl_s: ttl,
                    };
                    doc.lease = Some(lease);
                    doc.attempts += 1;
                    if set_running {
                        doc.status = StateStatus::Running;
                        doc.started_at.get_or_insert(now);
                    }
                    Ok(serde_json::to_value(doc)?)
                }),
            )
            .await
            .map_err(|e| classify_acquire_error(e))?;

        let doc: crate::domain::control_plane::StateDoc = serde_json::from_value(result).map_err(StoreError::from)?;
        let lease = doc.lease.expect("acquire always sets a lease on success");

        self.events.publish_control_plane(ControlPlaneEvent::LeaseAcquired {
            workflow_id,
            state: state.to_string(),
            owner_agent_id: owner_agent_id.to_string(),
            token: lease.token,
            at: now,
        });

        Ok(lease)
    }

    pub async fn renew(&self, workflow_id: WorkflowId, state: &str, token: Uuid) -> Result<Lease, LeaseError> {
        let key = crate::application::control_plane_service::state_key(workflow_id, state);
        let now = Utc::now();

        let result = self
            .store
            .compare_and_swap(
                &key,
                Box::new(move |current| -> Result<serde_json::Value, StoreError> {
                    let mut doc: crate::domain::control_plane::StateDoc = match current {
                        Some(v) => serde_json::from_value(v)?,
                        None => return Err(StoreError::NotFound(key_not_found_message())),
                    };
                    let lease = doc.lease.as_mut().ok_or_else(|| StoreError::InvalidInput("lease_mismatch".to_string()))?;
                    if lease.token != token {
                        return Err(StoreError::InvalidInput("lease_mismatch".to_string()));
                    }
                    lease.ts = now;
                    Ok(serde_json::to_value(doc)?)
                }),
            )
            .await
            .map_err(classify_lease_op_error)?;

        let doc: crate::domain::control_plane::StateDoc = serde_json::from_value(result).map_err(StoreError::from)?;
        let lease = doc.lease.expect("renew always preserves the lease on success");
        self.events.publish_control_plane(ControlPlaneEvent::LeaseRenewed {
            workflow_id,
            state: state.to_string(),
            token,
            at: now,
        });
        Ok(lease)
    }

    /// Clears the lease held by `token`. Does NOT change `status` — the
    /// caller is responsible for setting a terminal status (via
    /// `ControlPlaneService::update_state`) before or alongside releasing
    /// (§4.2).
    pub async fn release(&self, workflow_id: WorkflowId, state: &str, token: Uuid) -> Result<(), LeaseError> {
        let key = crate::application::control_plane_service::state_key(workflow_id, state);
        let now = Utc::now();

        self.store
            .compare_and_swap(
                &key,
                Box::new(move |current| -> Result<serde_json::Value, StoreError> {
                    let mut doc: crate::domain::control_plane::StateDoc = match current {
                        Some(v) => serde_json::from_value(v)?,
                        None => return Err(StoreError::NotFound(key_not_found_message())),
                    };
                    let matches = doc.lease.as_ref().map(|l| l.token == token).unwrap_or(false);
                    if !matches {
                        return Err(StoreError::InvalidInput("lease_mismatch".to_string()));
                    }
                    doc.lease = None;
                    Ok(serde_json::to_value(doc)?)
                }),
            )
            .await
            .map_err(classify_lease_op_error)?;

        self.events.publish_control_plane(ControlPlaneEvent::LeaseReleased {
            workflow_id,
            state: state.to_string(),
            at: now,
        });
        Ok(())
    }
}

fn key_not_found_message() -> String {
    "state document not found".to_string()
}

fn classify_acquire_error(err: StoreError) -> LeaseError {
    match &err {
        StoreError::InvalidInput(msg) if msg == "lease_held" => LeaseError::LeaseHeld,
        StoreError::InvalidInput(msg) if msg == "lease_expired_no_steal" => LeaseError::LeaseExpired,
        StoreError::Conflict => LeaseError::Conflict,
        _ => LeaseError::Store(err),
    }
}

fn classify_lease_op_error(err: StoreError) -> LeaseError {
    match &err {
        StoreError::InvalidInput(msg) if msg == "lease_mismatch" => LeaseError::LeaseMismatch,
        StoreError::Conflict => LeaseError::Conflict,
        _ => LeaseError::Store(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::control_plane_service::ControlPlaneService;
    use crate::domain::control_plane::{Deps, StateName, WorkflowMeta};
    use crate::infrastructure::memory_store::InMemoryDocumentStore;
    use std::collections::HashMap;

    async fn setup() -> (Arc<ControlPlaneService>, LeaseManager, WorkflowId) {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let events = EventBus::with_default_capacity();
        let control_plane = Arc::new(ControlPlaneService::new(store.clone(), events.clone()));
        let lease_manager = LeaseManager::new(control_plane.clone(), store, events);

        let wf = WorkflowId::new();
        let mut agents = HashMap::new();
        agents.insert("a".to_string(), "agent-1".to_string());
        control_plane
            .create_control_plane(WorkflowMeta {
                workflow_id: wf,
                workflow_name: "demo".into(),
                definition_version: "1".into(),
                session_id: None,
                agents,
                planner_agent_id: None,
                deps: HashMap::new(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                finalized_at: None,
                status: None,
                finalize_note: None,
                cost_summary: None,
            })
            .await
            .unwrap();
        let _ = StateName::new("a").unwrap();
        let _ = Deps::default();
        (control_plane, lease_manager, wf)
    }

    #[tokio::test]
    async fn acquire_then_second_acquire_fails_held() {
        let (_cp, lm, wf) = setup().await;
        lm.acquire(wf, "a", "agent-1", AcquireOptions::default()).await.unwrap();
        let err = lm.acquire(wf, "a", "agent-1", AcquireOptions::default()).await.unwrap_err();
        assert!(matches!(err, LeaseError::LeaseHeld));
    }

    #[tokio::test]
    async fn release_without_terminal_status_does_not_reopen_readiness() {
        // Releasing only clears the lease; the state is still `running`
        // (no caller-supplied terminal status), so it cannot be re-acquired
        // until something moves it back to `pending` (§4.4, §9).
        let (_cp, lm, wf) = setup().await;
        let lease = lm.acquire(wf, "a", "agent-1", AcquireOptions::default()).await.unwrap();
        lm.release(wf, "a", lease.token).await.unwrap();
        let err = lm.acquire(wf, "a", "agent-1", AcquireOptions::default()).await.unwrap_err();
        assert!(matches!(err, LeaseError::NotReady));
    }

    #[tokio::test]
    async fn release_after_terminal_status_cannot_be_reacquired() {
        let (cp, lm, wf) = setup().await;
        let lease = lm.acquire(wf, "a", "agent-1", AcquireOptions::default()).await.unwrap();
        cp.update_state(wf, "a", |mut doc| {
            doc.status = StateStatus::Succeeded;
            Ok(doc)
        })
        .await
        .unwrap();
        lm.release(wf, "a", lease.token).await.unwrap();
        let err = lm.acquire(wf, "a", "agent-1", AcquireOptions::default()).await.unwrap_err();
        assert!(matches!(err, LeaseError::NotReady));
    }

    #[tokio::test]
    async fn owner_mismatch_is_rejected() {
        let (_cp, lm, wf) = setup().await;
        let err = lm.acquire(wf, "a", "agent-2", AcquireOptions::default()).await.unwrap_err();
        assert!(matches!(err, LeaseError::OwnerMismatch));
    }
}
