// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Session/Companion Coordinator, "DCF+" (§4.7): a conductor agent creates a
//! session context, spins up companion agents, and delegates or broadcasts
//! tasks to them, independent of any workflow's state machine.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use choreo_core::domain::repository::{AgentRuntime, AgentSpec, DocumentStore};

use crate::domain::session::{CompanionMetadata, CompanionStatus, DelegationLog, DelegationRecord, SessionContext, SessionError};

fn session_key(session_id: &str) -> String {
    format!("session_context:{session_id}")
}

fn companion_key(session_id: &str, companion_id: &str) -> String {
    format!("session_context:{session_id}:companion:{companion_id}")
}

fn delegations_key(session_id: &str) -> String {
    format!("session_context:{session_id}:delegations")
}

pub struct SessionCoordinator {
    store: Arc<dyn DocumentStore>,
    runtime: Arc<dyn AgentRuntime>,
}

impl SessionCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, runtime: Arc<dyn AgentRuntime>) -> Self {
        Self { store, runtime }
    }

    pub async fn create_session_context(&self, session_id: &str, conductor_id: &str) -> Result<SessionContext, SessionError> {
        let key = session_key(session_id);
        if let Some(existing) = self.store.get(&key).await? {
            return Ok(serde_json::from_value(existing)?);
        }
        let context = SessionContext::new(session_id, conductor_id);
        self.store.set(&key, &serde_json::to_value(&context)?).await?;
        Ok(context)
    }

    pub async fn read_session_context(&self, session_id: &str) -> Result<SessionContext, SessionError> {
        self.store
            .get(&session_key(session_id))
            .await?
            .map(serde_json::from_value)
            .transpose()?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    pub async fn update_session_context(&self, session_id: &str, context: serde_json::Value) -> Result<SessionContext, SessionError> {
        let key = session_key(session_id);
        let session_id_owned = session_id.to_string();
        let updated = self
            .store
            .compare_and_swap(
                &key,
                Box::new(move |current| {
                    let mut ctx: SessionContext = current
                        .ok_or_else(|| choreo_core::domain::errors::StoreError::NotFound(session_id_owned.clone()))
                        .and_then(|v| serde_json::from_value(v).map_err(Into::into))?;
                    ctx.context = context;
                    ctx.updated_at = Utc::now();
                    Ok(serde_json::to_value(ctx)?)
                }),
            )
            .await?;
        Ok(serde_json::from_value(updated)?)
    }

    pub async fn update_conductor_guidelines(&self, session_id: &str, guidelines: String) -> Result<SessionContext, SessionError> {
        let key = session_key(session_id);
        let session_id_owned = session_id.to_string();
        let updated = self
            .store
            .compare_and_swap(
                &key,
                Box::new(move |current| {
                    let mut ctx: SessionContext = current
                        .ok_or_else(|| choreo_core::domain::errors::StoreError::NotFound(session_id_owned.clone()))
                        .and_then(|v| serde_json::from_value(v).map_err(Into::into))?;
                    ctx.guidelines = Some(guidelines);
                    ctx.updated_at = Utc::now();
                    Ok(serde_json::to_value(ctx)?)
                }),
            )
            .await?;
        Ok(serde_json::from_value(updated)?)
    }

    pub async fn create_companion(&self, session_id: &str, specialization: &str, template_name: &str) -> Result<CompanionMetadata, SessionError> {
        let session = self.read_session_context(session_id).await?;
        let companion_id = Uuid::new_v4().to_string();
        let mut metadata = CompanionMetadata::new(session_id, &companion_id, specialization, &session.conductor_id);

        let agent_id = self
            .runtime
            .create_agent(AgentSpec {
                template_name: template_name.to_string(),
                name: format!("{session_id}-companion-{specialization}"),
                tags: metadata.to_tags(),
                memory_blocks: vec![("session_context".to_string(), session.context.clone())],
            })
            .await?;
        metadata.companion_id = agent_id.clone();

        self.store.set(&companion_key(session_id, &agent_id), &serde_json::to_value(&metadata)?).await?;
        Ok(metadata)
    }

    pub async fn list_session_companions(&self, session_id: &str) -> Result<Vec<CompanionMetadata>, SessionError> {
        let prefix = format!("session_context:{session_id}:companion:");
        let keys = self.store.scan_prefix(&prefix).await?;
        let mut companions = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.store.get(&key).await? {
                companions.push(serde_json::from_value(value)?);
            }
        }
        Ok(companions)
    }

    pub async fn update_companion_status(&self, session_id: &str, companion_id: &str, status: CompanionStatus, current_task_id: Option<String>) -> Result<CompanionMetadata, SessionError> {
        let key = companion_key(session_id, companion_id);
        let companion_id_owned = companion_id.to_string();
        let updated = self
            .store
            .compare_and_swap(
                &key,
                Box::new(move |current| {
                    let mut meta: CompanionMetadata = current
                        .ok_or_else(|| choreo_core::domain::errors::StoreError::NotFound(companion_id_owned.clone()))
                        .and_then(|v| serde_json::from_value(v).map_err(Into::into))?;
                    meta.status = status;
                    meta.current_task_id = current_task_id;
                    Ok(serde_json::to_value(meta)?)
                }),
            )
            .await
            .map_err(|e| match e {
                choreo_core::domain::errors::StoreError::NotFound(_) => SessionError::CompanionNotFound(companion_id.to_string()),
                other => SessionError::Store(other),
            })?;
        Ok(serde_json::from_value(updated)?)
    }

    pub async fn delegate_task(&self, session_id: &str, companion_id: &str, payload: serde_json::Value) -> Result<String, SessionError> {
        let task_id = Uuid::new_v4().to_string();
        self.append_delegation(session_id, companion_id, &task_id, payload.clone()).await?;
        self.update_companion_status(session_id, companion_id, CompanionStatus::Busy, Some(task_id.clone())).await?;
        self.runtime.send_message_async(companion_id, "user", &payload).await?;
        Ok(task_id)
    }

    pub async fn broadcast_task(&self, session_id: &str, payload: serde_json::Value) -> Result<Vec<String>, SessionError> {
        let companions = self.list_session_companions(session_id).await?;
        let mut task_ids = Vec::with_capacity(companions.len());
        for companion in companions {
            let task_id = self.delegate_task(session_id, &companion.companion_id, payload.clone()).await?;
            task_ids.push(task_id);
        }
        Ok(task_ids)
    }

    pub async fn report_task_result(&self, session_id: &str, companion_id: &str, task_id: &str, result: serde_json::Value) -> Result<(), SessionError> {
        let key = delegations_key(session_id);
        let task_id_owned = task_id.to_string();
        let result_clone = result.clone();
        self.store
            .compare_and_swap(
                &key,
                Box::new(move |current| {
                    let mut log: DelegationLog = current.map(serde_json::from_value).transpose()?.unwrap_or_default();
                    log.complete(&task_id_owned, result_clone);
                    Ok(serde_json::to_value(log)?)
                }),
            )
            .await?;
        self.update_companion_status(session_id, companion_id, CompanionStatus::Idle, None).await?;
        Ok(())
    }

    pub async fn read_session_activity(&self, session_id: &str) -> Result<DelegationLog, SessionError> {
        Ok(self
            .store
            .get(&delegations_key(session_id))
            .await?
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default())
    }

    pub async fn finalize_session(&self, session_id: &str) -> Result<(), SessionError> {
        let key = session_key(session_id);
        let session_id_owned = session_id.to_string();
        self.store
            .compare_and_swap(
                &key,
                Box::new(move |current| {
                    let mut ctx: SessionContext = current
                        .ok_or_else(|| choreo_core::domain::errors::StoreError::NotFound(session_id_owned.clone()))
                        .and_then(|v| serde_json::from_value(v).map_err(Into::into))?;
                    if ctx.finalized_at.is_some() {
                        return Err(choreo_core::domain::errors::StoreError::InvalidInput("already_finalized".to_string()));
                    }
                    ctx.finalized_at = Some(Utc::now());
                    Ok(serde_json::to_value(ctx)?)
                }),
            )
            .await
            .map_err(|e| match &e {
                choreo_core::domain::errors::StoreError::InvalidInput(msg) if msg == "already_finalized" => SessionError::AlreadyFinalized,
                _ => SessionError::Store(e),
            })?;

        let companions = self.list_session_companions(session_id).await?;
        for companion in companions {
            self.runtime.delete_agent(&companion.companion_id).await?;
        }
        Ok(())
    }

    fn append_delegation<'a>(&'a self, session_id: &'a str, companion_id: &'a str, task_id: &'a str, payload: serde_json::Value) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), SessionError>> + Send + 'a>> {
        Box::pin(async move {
            let key = delegations_key(session_id);
            let record = DelegationRecord {
                task_id: task_id.to_string(),
                session_id: session_id.to_string(),
                companion_id: companion_id.to_string(),
                payload,
                delegated_at: Utc::now(),
                result: None,
                completed_at: None,
            };
            self.store
                .compare_and_swap(
                    &key,
                    Box::new(move |current| {
                        let mut log: DelegationLog = current.map(serde_json::from_value).transpose()?.unwrap_or_default();
                        log.push(record);
                        Ok(serde_json::to_value(log)?)
                    }),
                )
                .await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use choreo_core::domain::errors::RuntimeError;
    use choreo_core::domain::repository::AgentMessageResult;
    use choreo_core::infrastructure::memory_store::InMemoryDocumentStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRuntime {
        counter: AtomicUsize,
    }

    #[async_trait]
    impl AgentRuntime for StubRuntime {
        async fn create_agent(&self, _spec: AgentSpec) -> Result<String, RuntimeError> {
            let id = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("companion-{id}"))
        }
        async fn delete_agent(&self, _agent_id: &str) -> Result<(), RuntimeError> {
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

    fn coordinator() -> SessionCoordinator {
        SessionCoordinator::new(Arc::new(InMemoryDocumentStore::new()), Arc::new(StubRuntime { counter: AtomicUsize::new(0) }))
    }

    #[tokio::test]
    async fn create_session_context_is_idempotent() {
        let coord = coordinator();
        let a = coord.create_session_context("s1", "conductor-1").await.unwrap();
        let b = coord.create_session_context("s1", "conductor-1").await.unwrap();
        assert_eq!(a.session_id, b.session_id);
    }

    #[tokio::test]
    async fn delegate_then_report_result_completes_delegation() {
        let coord = coordinator();
        coord.create_session_context("s1", "conductor-1").await.unwrap();
        let companion = coord.create_companion("s1", "research", "companion-template").await.unwrap();

        let task_id = coord.delegate_task("s1", &companion.companion_id, serde_json::json!({"do": "it"})).await.unwrap();
        coord.report_task_result("s1", &companion.companion_id, &task_id, serde_json::json!({"ok": true})).await.unwrap();

        let activity = coord.read_session_activity("s1").await.unwrap();
        let record = activity.records.iter().find(|r| r.task_id == task_id).unwrap();
        assert!(record.completed_at.is_some());
    }

    #[tokio::test]
    async fn finalize_twice_fails_second_time() {
        let coord = coordinator();
        coord.create_session_context("s1", "conductor-1").await.unwrap();
        coord.finalize_session("s1").await.unwrap();
        let err = coord.finalize_session("s1").await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyFinalized));
    }
}
