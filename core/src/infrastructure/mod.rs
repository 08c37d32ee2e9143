// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod agent_runtime_http;
pub mod bundle_loader;
pub mod config;
pub mod event_bus;
pub mod memory_store;
#[cfg(feature = "redis-store")]
pub mod redis_store;
pub mod workflow_schema;
