// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Session domain layer (§4.7 "DCF+"): pure types for session contexts,
//! companion metadata, and the delegation log. No I/O dependencies.

pub mod session;

pub use session::*;
