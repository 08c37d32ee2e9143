// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! In-memory [`DocumentStore`](crate::domain::repository::DocumentStore),
//! selected via the `memory://` document-store URL. Used by tests and the
//! single-process `choreo serve --store memory` mode.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::errors::StoreError;
use crate::domain::repository::DocumentStore;

/// Stores documents in a `DashMap`, guarding compare-and-swap with a global
/// mutex per key so the read-modify-write window stays atomic without a
/// real WATCH/MULTI/EXEC round trip.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    docs: DashMap<String, Value>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.docs.get(key).map(|v| v.clone()))
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        self.docs.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        patch: Box<dyn FnOnce(Option<Value>) -> Result<Value, StoreError> + Send>,
    ) -> Result<Value, StoreError> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        let current = self.docs.get(key).map(|v| v.clone());
        let next = patch(current)?;
        self.docs.insert(key.to_string(), next.clone());
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.docs.remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .docs
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|k| k.starts_with(prefix))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryDocumentStore::new();
        store.set("k", &json!({"a": 1})).await.unwrap();
        let got = store.get("k").await.unwrap();
        assert_eq!(got, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn cas_patches_existing_value() {
        let store = InMemoryDocumentStore::new();
        store.set("k", &json!({"count": 1})).await.unwrap();
        let result = store
            .compare_and_swap(
                "k",
                Box::new(|current| {
                    let mut v = current.unwrap();
                    v["count"] = json!(v["count"].as_i64().unwrap() + 1);
                    Ok(v)
                }),
            )
            .await
            .unwrap();
        assert_eq!(result["count"], json!(2));
    }

    #[tokio::test]
    async fn scan_prefix_filters_keys() {
        let store = InMemoryDocumentStore::new();
        store.set("cp:wf:1:meta", &json!({})).await.unwrap();
        store.set("cp:wf:1:state:a", &json!({})).await.unwrap();
        store.set("other", &json!({})).await.unwrap();
        let mut keys = store.scan_prefix("cp:wf:1:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["cp:wf:1:meta".to_string(), "cp:wf:1:state:a".to_string()]);
    }
}
