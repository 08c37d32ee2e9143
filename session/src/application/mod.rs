// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Session application layer (§4.7 "DCF+"): the `SessionCoordinator` use
//! cases for conductor/companion lifecycle and task delegation.

pub mod coordinator;

pub use coordinator::SessionCoordinator;
