// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # choreo-core
//!
//! The control-plane crate for Choreo, a choreography-model multi-agent
//! workflow orchestrator. No central driver loop exists: worker agents
//! execute a state, write their output, and notify downstream peers
//! themselves. This crate owns the domain model, application services and
//! store/runtime adapters that make that possible.
//!
//! ## Components
//!
//! | Component | Module |
//! |---|---|
//! | Control-Plane Store | [`application::control_plane_service`] |
//! | Lease Manager | [`application::lease_manager`] |
//! | Workflow Bootstrap | [`application::bootstrap`] |
//! | Readiness Evaluator & Notifier | [`application::readiness`] |
//! | Workflow Definition Validator | [`application::validator`] |
//! | Finalizer | [`application::finalizer`] |
//! | Task Complexity Scorer (AMSP) | [`application::complexity`] |
//! | Tool Surface | [`presentation::http`] |
//!
//! ## Layer structure
//!
//! ```text
//! presentation/   <- axum HTTP tool surface
//!     |
//! application/    <- use-cases: control plane, leasing, bootstrap, readiness,
//!                     validation, finalization, complexity scoring
//!     |
//! domain/         <- WorkflowMeta/StateDoc/Lease aggregates, DocumentStore
//!                     and AgentRuntime port traits, domain events
//!     |
//! infrastructure/ <- in-memory and Redis document stores, HTTP agent-runtime
//!                     adapter, bundle loader, embedded JSON Schema, config
//! ```
//!
//! The agent-runtime service and the JSON document store backing
//! `DocumentStore` are external systems accessed only through the traits in
//! [`domain::repository`]; this crate does not reimplement them.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::control_plane::*;
pub use domain::errors::ErrorKind;
