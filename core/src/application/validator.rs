// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Workflow Definition Validator (§4.5): JSON-Schema validation, bundle
//! reference resolution, and DAG/graph checks over a `WorkflowManifest`.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::validation::{GraphReport, ResolutionReport, UnresolvedReference, ValidationReport};
use crate::domain::workflow::{WorkflowDefinition, WorkflowError, WorkflowManifest, API_VERSION, KIND};
use crate::infrastructure::bundle_loader::BundleLoader;
use crate::infrastructure::workflow_schema::WorkflowSchema;

pub struct WorkflowValidator {
    schema: WorkflowSchema,
    bundle_loader: Arc<BundleLoader>,
}

impl WorkflowValidator {
    pub fn new(bundle_loader: Arc<BundleLoader>) -> Self {
        Self {
            schema: WorkflowSchema::embedded(),
            bundle_loader,
        }
    }

    /// Runs all three validation phases and returns the combined report,
    /// never erroring for a structurally-invalid workflow — failures are
    /// recorded in the report and reflected in `exit_code` (§4.5, §8).
    pub async fn validate(&self, manifest_json: &Value) -> ValidationReport {
        let schema_errors = self.schema.validate(manifest_json);
        if !schema_errors.is_empty() {
            return ValidationReport {
                schema_errors,
                resolution: ResolutionReport::default(),
                graph: GraphReport::default(),
                exit_code: 1,
            }
            .finalize_exit_code();
        }

        let manifest: WorkflowManifest = match serde_json::from_value(manifest_json.clone()) {
            Ok(m) => m,
            Err(e) => {
                return ValidationReport {
                    schema_errors: vec![crate::domain::validation::SchemaError {
                        instance_path: String::new(),
                        schema_path: String::new(),
                        message: e.to_string(),
                    }],
                    resolution: ResolutionReport::default(),
                    graph: GraphReport::default(),
                    exit_code: 1,
                }
                .finalize_exit_code()
            }
        };

        let mut report = ValidationReport::success();

        if manifest.api_version != API_VERSION {
            report.schema_errors.push(crate::domain::validation::SchemaError {
                instance_path: "/apiVersion".to_string(),
                schema_path: "#/properties/apiVersion".to_string(),
                message: format!("expected {API_VERSION}, got {}", manifest.api_version),
            });
        }
        if manifest.kind != KIND {
            report.schema_errors.push(crate::domain::validation::SchemaError {
                instance_path: "/kind".to_string(),
                schema_path: "#/properties/kind".to_string(),
                message: format!("expected {KIND}, got {}", manifest.kind),
            });
        }
        if let Err(e) = crate::domain::workflow::WorkflowMetadata::validate_name(&manifest.metadata.name) {
            report.schema_errors.push(crate::domain::validation::SchemaError {
                instance_path: "/metadata/name".to_string(),
                schema_path: "#/properties/metadata/properties/name".to_string(),
                message: e.to_string(),
            });
        }

        report.resolution = self.resolve_bundles(&manifest.spec).await;
        report.graph = self.check_graph(&manifest.spec);

        report.finalize_exit_code()
    }

    async fn resolve_bundles(&self, definition: &WorkflowDefinition) -> ResolutionReport {
        let mut report = ResolutionReport::default();
        for import in definition.af_imports.iter().chain(definition.skill_imports.iter()) {
            match self.bundle_loader.load(import).await {
                Ok(bundle) => report.resolved.push(bundle.name),
                Err(e) => report.unresolved.push(UnresolvedReference {
                    name: import.name.clone(),
                    uri: import.uri.clone(),
                    reason: e.to_string(),
                }),
            }
        }
        report
    }

    fn check_graph(&self, definition: &WorkflowDefinition) -> GraphReport {
        let mut report = GraphReport::default();
        match definition.validate_structure() {
            Ok(()) => {}
            Err(WorkflowError::Cycle(state)) => report.cycles.push(state),
            Err(WorkflowError::Unreachable(state)) => report.unreachable_states.push(state),
            Err(WorkflowError::NextTargetNotFound(target)) | Err(WorkflowError::StartAtNotFound(target)) => {
                report.dangling_targets.push(target)
            }
            Err(_) => {}
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> WorkflowValidator {
        WorkflowValidator::new(Arc::new(BundleLoader::new(".")))
    }

    #[tokio::test]
    async fn valid_manifest_has_exit_code_zero() {
        let manifest = json!({
            "apiVersion": "choreo.dev/v1",
            "kind": "Workflow",
            "metadata": {"name": "order-pipeline"},
            "spec": {
                "StartAt": "a",
                "States": {
                    "a": {"Type": "Task", "agent_template": "worker", "Next": "b"},
                    "b": {"Type": "Succeed"}
                }
            }
        });
        let report = validator().validate(&manifest).await;
        assert_eq!(report.exit_code, 0);
    }

    #[tokio::test]
    async fn cycle_is_reported_and_nonzero_exit() {
        let manifest = json!({
            "apiVersion": "choreo.dev/v1",
            "kind": "Workflow",
            "metadata": {"name": "order-pipeline"},
            "spec": {
                "StartAt": "a",
                "States": {
                    "a": {"Type": "Task", "agent_template": "worker", "Next": "b"},
                    "b": {"Type": "Task", "agent_template": "worker", "Next": "a"}
                }
            }
        });
        let report = validator().validate(&manifest).await;
        assert_ne!(report.exit_code, 0);
        assert!(!report.graph.cycles.is_empty());
    }
}
