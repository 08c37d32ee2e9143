// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Store and runtime port traits (§9: "Storage Gateway" re-architected as a
//! document-store port; the external agent-runtime service as a typed port).
//!
//! Everything above this module talks only to [`DocumentStore`] and
//! [`AgentRuntime`]. Concrete adapters live in `crate::infrastructure`.

use async_trait::async_trait;
use serde_json::Value;

pub use super::errors::{RuntimeError, StoreError};

/// A document store supporting optimistic concurrency and atomic JSON
/// patches (§4.1, §9). Concrete adapters: `InMemoryDocumentStore` (tests,
/// `memory://`) and `RedisDocumentStore` (production, Redis + RedisJSON).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads the JSON document at `key`, returning `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Unconditionally writes `value` at `key`.
    async fn set(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Atomically applies `patch` to the document at `key` and returns the
    /// updated document, failing with [`StoreError::Conflict`] if the
    /// document changed between the read inside `patch` and the write
    /// (a WATCH/MULTI/EXEC-style compare-and-swap).
    ///
    /// `patch` receives the current document (`None` if the key is absent)
    /// and returns the document to write, or `Err` to abort without writing.
    async fn compare_and_swap(
        &self,
        key: &str,
        patch: Box<dyn FnOnce(Option<Value>) -> Result<Value, StoreError> + Send>,
    ) -> Result<Value, StoreError>;

    /// Deletes the document at `key`. Not an error if absent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Lists keys matching a `prefix`, used by the finalizer to enumerate a
    /// workflow's `state:*` documents.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Request payload to create a worker or companion agent (§4.3, §4.7).
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub template_name: String,
    pub name: String,
    pub tags: Vec<String>,
    pub memory_blocks: Vec<(String, Value)>,
}

/// Outcome of sending a message into an agent's run loop.
#[derive(Debug, Clone)]
pub struct AgentMessageResult {
    pub message_id: Option<String>,
    pub run_id: Option<String>,
}

/// The external agent-runtime service, accessed only through this trait
/// (§2: treated as an opaque service behind a typed interface; out of scope
/// to reimplement).
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn create_agent(&self, spec: AgentSpec) -> Result<String, RuntimeError>;

    async fn delete_agent(&self, agent_id: &str) -> Result<(), RuntimeError>;

    async fn attach_tool(&self, agent_id: &str, tool_name: &str) -> Result<(), RuntimeError>;

    async fn attach_memory_block(&self, agent_id: &str, label: &str, value: &Value) -> Result<(), RuntimeError>;

    /// Sends a message synchronously and returns the terminal message id.
    async fn send_message(&self, agent_id: &str, role: &str, content: &Value) -> Result<AgentMessageResult, RuntimeError>;

    /// Sends a message asynchronously and returns the run id.
    async fn send_message_async(&self, agent_id: &str, role: &str, content: &Value) -> Result<AgentMessageResult, RuntimeError>;
}
