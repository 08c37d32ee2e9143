// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `choreo` CLI library - exposes testable components.

pub mod commands;
