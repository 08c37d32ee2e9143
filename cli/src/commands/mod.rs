// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the `choreo` CLI.

pub mod serve;
pub mod validate;
