// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Thin HTTP adapter over the external agent-runtime service (§2, §4.3,
//! §4.7). The agent-runtime service itself is out of scope: this module
//! only translates [`AgentRuntime`] calls into HTTP requests and responses
//! into [`RuntimeError`]s.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::domain::errors::RuntimeError;
use crate::domain::repository::{AgentMessageResult, AgentRuntime, AgentSpec};

pub struct HttpAgentRuntime {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpAgentRuntime {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut req = self.client.request(method, url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, RuntimeError> {
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RuntimeError::NotFound(status.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RuntimeError::Backend(format!("{status}: {body}")));
        }
        resp.json::<T>().await.map_err(|e| RuntimeError::Backend(e.to_string()))
    }
}

#[async_trait]
impl AgentRuntime for HttpAgentRuntime {
    async fn create_agent(&self, spec: AgentSpec) -> Result<String, RuntimeError> {
        let body = json!({
            "template": spec.template_name,
            "name": spec.name,
            "tags": spec.tags,
            "memory_blocks": spec.memory_blocks.into_iter().map(|(label, value)| json!({"label": label, "value": value})).collect::<Vec<_>>(),
        });
        let resp = self
            .request(reqwest::Method::POST, "/v1/agents")
            .json(&body)
            .send()
            .await
            .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?;
        let parsed: Value = Self::decode(resp).await?;
        parsed
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| RuntimeError::Backend("agent-runtime response missing id".into()))
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<(), RuntimeError> {
        let resp = self
            .request(reqwest::Method::DELETE, &format!("/v1/agents/{agent_id}"))
            .send()
            .await
            .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND || resp.status().is_success() {
            return Ok(());
        }
        Err(RuntimeError::Backend(resp.status().to_string()))
    }

    async fn attach_tool(&self, agent_id: &str, tool_name: &str) -> Result<(), RuntimeError> {
        let resp = self
            .request(reqwest::Method::PATCH, &format!("/v1/agents/{agent_id}/tools/attach"))
            .json(&json!({"tool": tool_name}))
            .send()
            .await
            .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?;
        let _: Value = Self::decode(resp).await?;
        Ok(())
    }

    async fn attach_memory_block(&self, agent_id: &str, label: &str, value: &Value) -> Result<(), RuntimeError> {
        let resp = self
            .request(reqwest::Method::PATCH, &format!("/v1/agents/{agent_id}/memory-blocks"))
            .json(&json!({"label": label, "value": value}))
            .send()
            .await
            .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?;
        let _: Value = Self::decode(resp).await?;
        Ok(())
    }

    async fn send_message(&self, agent_id: &str, role: &str, content: &Value) -> Result<AgentMessageResult, RuntimeError> {
        let resp = self
            .request(reqwest::Method::POST, &format!("/v1/agents/{agent_id}/messages"))
            .json(&json!({"role": role, "content": content, "async": false}))
            .send()
            .await
            .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?;
        let parsed: Value = Self::decode(resp).await?;
        let message_id = parsed["messages"]
            .as_array()
            .and_then(|m| m.last())
            .and_then(|m| m.get("id"))
            .and_then(Value::as_str)
            .map(String::from);
        Ok(AgentMessageResult { message_id, run_id: None })
    }

    async fn send_message_async(&self, agent_id: &str, role: &str, content: &Value) -> Result<AgentMessageResult, RuntimeError> {
        let resp = self
            .request(reqwest::Method::POST, &format!("/v1/agents/{agent_id}/messages"))
            .json(&json!({"role": role, "content": content, "async": true}))
            .send()
            .await
            .map_err(|e| RuntimeError::ConnectionFailed(e.to_string()))?;
        let parsed: Value = Self::decode(resp).await?;
        let run_id = parsed.get("run_id").or_else(|| parsed.get("id")).and_then(Value::as_str).map(String::from);
        Ok(AgentMessageResult { message_id: None, run_id })
    }
}
