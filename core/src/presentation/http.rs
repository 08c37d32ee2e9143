// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! HTTP tool surface (§4.8): one route per tool under `/tools/{name}`, plus
//! `/healthz`, `/readyz`, and `/metrics`. Every request passes through a
//! DNS-rebinding-protection layer that rejects requests whose `Host` (and,
//! if present, `Origin`) header is not on the configured allowlist.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::application::tool_service::ToolService;
use crate::domain::control_plane::{StateStatus, WorkflowId};

#[derive(Clone)]
pub struct AppState {
    pub tools: Arc<ToolService>,
    pub allowed_hosts: Arc<Vec<String>>,
}

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let allowlist = state.allowed_hosts.clone();

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/tools/validate_workflow", post(validate_workflow))
        .route("/tools/create_control_plane", post(create_control_plane))
        .route("/tools/read_control_plane/{workflow_id}", get(read_control_plane))
        .route("/tools/acquire_state_lease", post(acquire_state_lease))
        .route("/tools/renew_state_lease", post(renew_state_lease))
        .route("/tools/release_state_lease", post(release_state_lease))
        .route("/tools/notify_if_ready", post(notify_if_ready))
        .route("/tools/finalize_workflow", post(finalize_workflow))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(middleware::from_fn_with_state(allowlist, dns_rebinding_guard)),
        )
        .with_state(state)
}

/// Rejects requests whose `Host` header (and `Origin` host, if present) is
/// not in the configured allowlist — the tool surface's DNS-rebinding
/// defense (§4.8).
async fn dns_rebinding_guard(
    State(allowlist): State<Arc<Vec<String>>>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    if allowlist.is_empty() {
        return next.run(request).await;
    }

    let host_ok = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| host_allowed(h, &allowlist))
        .unwrap_or(false);

    let origin_ok = match headers.get(axum::http::header::ORIGIN).and_then(|v| v.to_str().ok()) {
        Some(origin) => url::Url::parse(origin)
            .ok()
            .and_then(|u| u.host_str().map(|h| host_allowed(h, &allowlist)))
            .unwrap_or(false),
        None => true,
    };

    if host_ok && origin_ok {
        next.run(request).await
    } else {
        (StatusCode::FORBIDDEN, "host not allowed").into_response()
    }
}

fn host_allowed(host_header: &str, allowlist: &[String]) -> bool {
    let host_only = host_header.split(':').next().unwrap_or(host_header);
    allowlist.iter().any(|allowed| allowed == host_only)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz() -> &'static str {
    "ready"
}

async fn metrics() -> String {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle()
        .render()
}

async fn validate_workflow(State(state): State<AppState>, Json(manifest): Json<Value>) -> Json<Value> {
    let span = info_span!("tool", tool = "validate_workflow");
    Json(state.tools.validate_workflow(&manifest).instrument(span).await)
}

#[derive(serde::Deserialize)]
struct CreateControlPlaneRequest {
    workflow_id: Uuid,
    workflow_name: String,
    definition_version: String,
    session_id: Option<String>,
    definition: crate::domain::workflow::WorkflowDefinition,
}

async fn create_control_plane(State(state): State<AppState>, Json(req): Json<CreateControlPlaneRequest>) -> Json<Value> {
    let workflow_id = WorkflowId::from_uuid(req.workflow_id);
    let span = info_span!("tool", tool = "create_control_plane", workflow_id = %workflow_id);
    Json(
        state
            .tools
            .create_control_plane(workflow_id, &req.workflow_name, &req.definition_version, req.session_id, &req.definition)
            .instrument(span)
            .await,
    )
}

async fn read_control_plane(State(state): State<AppState>, Path(workflow_id): Path<Uuid>) -> Json<Value> {
    let workflow_id = WorkflowId::from_uuid(workflow_id);
    let span = info_span!("tool", tool = "read_control_plane", workflow_id = %workflow_id);
    Json(state.tools.read_control_plane(workflow_id).instrument(span).await)
}

#[derive(serde::Deserialize)]
struct LeaseRequest {
    workflow_id: Uuid,
    state: String,
    owner_agent_id: String,
}

async fn acquire_state_lease(State(state): State<AppState>, Json(req): Json<LeaseRequest>) -> Json<Value> {
    let workflow_id = WorkflowId::from_uuid(req.workflow_id);
    let span = info_span!("tool", tool = "acquire_state_lease", workflow_id = %workflow_id, state = %req.state);
    Json(
        state
            .tools
            .acquire_state_lease(workflow_id, &req.state, &req.owner_agent_id)
            .instrument(span)
            .await,
    )
}

#[derive(serde::Deserialize)]
struct RenewLeaseRequest {
    workflow_id: Uuid,
    state: String,
    token: Uuid,
}

async fn renew_state_lease(State(state): State<AppState>, Json(req): Json<RenewLeaseRequest>) -> Json<Value> {
    let workflow_id = WorkflowId::from_uuid(req.workflow_id);
    let span = info_span!("tool", tool = "renew_state_lease", workflow_id = %workflow_id, state = %req.state);
    Json(state.tools.renew_state_lease(workflow_id, &req.state, req.token).instrument(span).await)
}

#[derive(serde::Deserialize)]
struct ReleaseLeaseRequest {
    workflow_id: Uuid,
    state: String,
    token: Uuid,
    final_status: StateStatus,
}

async fn release_state_lease(State(state): State<AppState>, Json(req): Json<ReleaseLeaseRequest>) -> Json<Value> {
    let workflow_id = WorkflowId::from_uuid(req.workflow_id);
    let span = info_span!("tool", tool = "release_state_lease", workflow_id = %workflow_id, state = %req.state);
    Json(
        state
            .tools
            .release_state_lease(workflow_id, &req.state, req.token, req.final_status)
            .instrument(span)
            .await,
    )
}

#[derive(serde::Deserialize)]
struct NotifyRequest {
    workflow_id: Uuid,
    from_state: String,
    to_state: String,
}

async fn notify_if_ready(State(state): State<AppState>, Json(req): Json<NotifyRequest>) -> Json<Value> {
    let workflow_id = WorkflowId::from_uuid(req.workflow_id);
    let span = info_span!("tool", tool = "notify_if_ready", workflow_id = %workflow_id);
    Json(
        state
            .tools
            .notify_if_ready(workflow_id, &req.from_state, &req.to_state)
            .instrument(span)
            .await,
    )
}

#[derive(serde::Deserialize)]
struct FinalizeRequest {
    workflow_id: Uuid,
    #[serde(default = "default_true")]
    close_open_states: bool,
    #[serde(default)]
    overall_status: Option<crate::domain::control_plane::WorkflowStatus>,
    #[serde(default)]
    preserve_planner: bool,
}

fn default_true() -> bool {
    true
}

async fn finalize_workflow(State(state): State<AppState>, Json(req): Json<FinalizeRequest>) -> Json<Value> {
    let workflow_id = WorkflowId::from_uuid(req.workflow_id);
    let span = info_span!("tool", tool = "finalize_workflow", workflow_id = %workflow_id);
    Json(
        state
            .tools
            .finalize_workflow(workflow_id, req.close_open_states, req.overall_status, req.preserve_planner)
            .instrument(span)
            .await,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_allowed_strips_port() {
        let allowlist = vec!["localhost".to_string()];
        assert!(host_allowed("localhost:8080", &allowlist));
        assert!(!host_allowed("evil.example.com", &allowlist));
    }
}
