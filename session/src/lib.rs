// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # choreo-session
//!
//! Session and companion coordination ("DCF+", §4.7): a secondary layer on
//! top of the control plane in `choreo-core`. A conductor agent creates a
//! session context, spawns companion agents through the same `AgentRuntime`
//! port the control plane uses, and delegates or broadcasts tasks to them —
//! independent of any workflow's state machine.
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `SessionContext`, `CompanionMetadata`, `DelegationLog` |
//! | [`application`] | Application | `SessionCoordinator` |

pub mod application;
pub mod domain;

pub use domain::*;
