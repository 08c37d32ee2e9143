// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `choreo serve` — boots the HTTP tool surface (§4.8) wired to either the
//! in-memory document store or Redis, depending on `DOCUMENT_STORE_URL`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use choreo_core::application::bootstrap::WorkflowBootstrap;
use choreo_core::application::control_plane_service::ControlPlaneService;
use choreo_core::application::finalizer::Finalizer;
use choreo_core::application::lease_manager::LeaseManager;
use choreo_core::application::readiness::ReadinessNotifier;
use choreo_core::application::tool_service::ToolService;
use choreo_core::application::validator::WorkflowValidator;
use choreo_core::domain::repository::{AgentRuntime, DocumentStore};
use choreo_core::infrastructure::agent_runtime_http::HttpAgentRuntime;
use choreo_core::infrastructure::bundle_loader::BundleLoader;
use choreo_core::infrastructure::config::Config;
use choreo_core::infrastructure::event_bus::EventBus;
use choreo_core::infrastructure::memory_store::InMemoryDocumentStore;
use choreo_core::presentation::http::{self, AppState};

const EVENT_BUS_CAPACITY: usize = 1024;

#[derive(Args)]
pub struct ServeArgs {
    /// Extra host allowed through the DNS-rebinding guard, beyond
    /// whatever the listen address's own host implies. May be repeated.
    #[arg(long = "allow-host", value_name = "HOST")]
    allow_hosts: Vec<String>,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    let store: Arc<dyn DocumentStore> = build_store(&config.document_store_url)?;
    let runtime: Arc<dyn AgentRuntime> = Arc::new(HttpAgentRuntime::new(
        config.agent_runtime_url.clone(),
        config.agent_runtime_token.clone(),
    ));
    let events = EventBus::new(EVENT_BUS_CAPACITY);

    let control_plane = Arc::new(ControlPlaneService::new(store.clone(), events.clone()));
    let tools = Arc::new(ToolService {
        control_plane: control_plane.clone(),
        lease_manager: Arc::new(LeaseManager::new(control_plane.clone(), store.clone(), events.clone())),
        bootstrap: Arc::new(WorkflowBootstrap::new(control_plane.clone(), runtime.clone())),
        readiness: Arc::new(ReadinessNotifier::new(control_plane.clone(), runtime.clone(), events.clone())),
        validator: Arc::new(WorkflowValidator::new(Arc::new(BundleLoader::new(".")))),
        finalizer: Arc::new(Finalizer::new(control_plane, store, runtime, events)),
    });

    let state = AppState {
        tools,
        allowed_hosts: Arc::new(args.allow_hosts),
    };

    let router = http::router(state, Duration::from_millis(config.request_timeout_ms));

    info!(addr = %config.listen_addr, "starting choreo tool surface");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    axum::serve(listener, router).await.context("server error")?;

    Ok(())
}

fn build_store(url: &str) -> Result<Arc<dyn DocumentStore>> {
    if url == "memory://" {
        return Ok(Arc::new(InMemoryDocumentStore::new()));
    }

    #[cfg(feature = "redis-store")]
    if url.starts_with("redis://") || url.starts_with("rediss://") {
        let store = choreo_core::infrastructure::redis_store::RedisDocumentStore::connect(url)
            .context("failed to connect to the document store")?;
        return Ok(Arc::new(store));
    }

    anyhow::bail!(
        "unsupported DOCUMENT_STORE_URL '{url}' (enable the `redis-store` feature for redis:// URLs)"
    )
}
