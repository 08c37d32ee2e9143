// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Redis + RedisJSON backed [`DocumentStore`](crate::domain::repository::DocumentStore)
//! (§4.1, §9). Atomicity is implemented the same way the control plane's
//! original Python tools did it: `WATCH key`, read, `MULTI` / `JSON.SET` /
//! `EXEC`, retrying the caller on a `WatchError`-equivalent conflict.
//!
//! The document store itself (a JSON key-value store supporting optimistic
//! concurrency) is an external dependency, not something this crate
//! reimplements; this module is a thin adapter over it.

use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use serde_json::Value;

use crate::domain::errors::StoreError;
use crate::domain::repository::DocumentStore;

pub struct RedisDocumentStore {
    client: Client,
}

impl RedisDocumentStore {
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        let raw: Option<String> = redis::cmd("JSON.GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        let body = serde_json::to_string(value)?;
        redis::cmd("JSON.SET")
            .arg(key)
            .arg("$")
            .arg(body)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        patch: Box<dyn FnOnce(Option<Value>) -> Result<Value, StoreError> + Send>,
    ) -> Result<Value, StoreError> {
        // A dedicated connection is required: WATCH state is per-connection
        // and must not be shared with a pooled/multiplexed connection.
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        redis::cmd("WATCH")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let raw: Option<String> = redis::cmd("JSON.GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let current = raw.map(|s| serde_json::from_str(&s)).transpose()?;

        let next = patch(current)?;
        let body = serde_json::to_string(&next)?;

        let mut pipe = redis::pipe();
        pipe.atomic().cmd("JSON.SET").arg(key).arg("$").arg(body);
        let result: Option<Vec<redis::Value>> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match result {
            Some(_) => Ok(next),
            None => Err(StoreError::Conflict),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        let _: () = conn.del(key).await.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        let pattern = format!("{prefix}*");
        let keys: Vec<String> = conn.keys(pattern).await.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(keys)
    }
}
