// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Report types produced by the workflow-definition validator (§4.5).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::errors::ErrorKind;

/// A single JSON Schema validation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaError {
    pub instance_path: String,
    pub schema_path: String,
    pub message: String,
}

/// Result of resolving `af_imports`/`skill_imports` bundle references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub resolved: Vec<String>,
    pub unresolved: Vec<UnresolvedReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedReference {
    pub name: String,
    pub uri: String,
    pub reason: String,
}

/// Result of the DAG/graph-shape checks (reachability, cycles, terminal
/// sanity) described in §4.5.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphReport {
    pub cycles: Vec<String>,
    pub unreachable_states: Vec<String>,
    pub dangling_targets: Vec<String>,
}

impl GraphReport {
    pub fn is_clean(&self) -> bool {
        self.cycles.is_empty() && self.unreachable_states.is_empty() && self.dangling_targets.is_empty()
    }
}

/// The combined validation outcome for a workflow definition (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub schema_errors: Vec<SchemaError>,
    pub resolution: ResolutionReport,
    pub graph: GraphReport,
    /// 0 on success, non-zero on any failure category — mirrors a CLI-style
    /// validator exit code so the tool surface and the CLI agree on outcome.
    pub exit_code: i32,
}

impl ValidationReport {
    pub fn success() -> Self {
        Self {
            schema_errors: Vec::new(),
            resolution: ResolutionReport::default(),
            graph: GraphReport::default(),
            exit_code: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.schema_errors.is_empty() && self.resolution.unresolved.is_empty() && self.graph.is_clean()
    }

    pub fn finalize_exit_code(mut self) -> Self {
        self.exit_code = if self.is_valid() { 0 } else { 1 };
        self
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("schema validation failed with {0} error(s)")]
    SchemaInvalid(usize),
    #[error("unresolved bundle reference: {0}")]
    UnresolvedReference(String),
    #[error("graph error: {0}")]
    GraphError(String),
    #[error("invalid validation request: {0}")]
    InvalidRequest(String),
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::SchemaInvalid(_) => ErrorKind::SchemaError,
            ValidationError::UnresolvedReference(_) => ErrorKind::UnresolvedReference,
            ValidationError::GraphError(_) => ErrorKind::GraphError,
            ValidationError::InvalidRequest(_) => ErrorKind::InvalidInput,
        }
    }
}
