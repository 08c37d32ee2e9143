// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Embedded Draft 2020-12 JSON Schema for workflow definitions (§4.5) and a
//! thin wrapper over the `jsonschema` crate's validator.

use jsonschema::Validator;
use serde_json::Value;

use crate::domain::validation::SchemaError;

/// Schema body describing the ASL-like `WorkflowManifest` shape accepted by
/// the validator. Narrower than a full ASL grammar: it checks the envelope
/// (`apiVersion`/`kind`/`metadata`/`spec`) and state-kind discriminants;
/// structural checks (DAG shape, reference resolution) run separately.
pub const WORKFLOW_SCHEMA: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "title": "WorkflowManifest",
  "type": "object",
  "required": ["apiVersion", "kind", "metadata", "spec"],
  "properties": {
    "apiVersion": { "const": "choreo.dev/v1" },
    "kind": { "const": "Workflow" },
    "metadata": {
      "type": "object",
      "required": ["name"],
      "properties": {
        "name": { "type": "string", "pattern": "^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$" }
      }
    },
    "spec": {
      "type": "object",
      "required": ["StartAt", "States"],
      "properties": {
        "StartAt": { "type": "string" },
        "States": {
          "type": "object",
          "minProperties": 1,
          "additionalProperties": {
            "type": "object",
            "required": ["Type"],
            "properties": {
              "Type": {
                "enum": ["Task", "Choice", "Parallel", "Map", "Wait", "Succeed", "Fail"]
              }
            }
          }
        }
      }
    }
  }
}"#;

pub struct WorkflowSchema {
    validator: Validator,
}

impl WorkflowSchema {
    pub fn embedded() -> Self {
        let schema: Value = serde_json::from_str(WORKFLOW_SCHEMA).expect("embedded workflow schema is valid JSON");
        let validator = jsonschema::validator_for(&schema).expect("embedded workflow schema compiles");
        Self { validator }
    }

    pub fn validate(&self, manifest: &Value) -> Vec<SchemaError> {
        self.validator
            .iter_errors(manifest)
            .map(|e| SchemaError {
                instance_path: e.instance_path.to_string(),
                schema_path: e.schema_path.to_string(),
                message: e.to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_minimal_valid_manifest() {
        let schema = WorkflowSchema::embedded();
        let manifest = json!({
            "apiVersion": "choreo.dev/v1",
            "kind": "Workflow",
            "metadata": {"name": "order-pipeline"},
            "spec": {
                "StartAt": "a",
                "States": {"a": {"Type": "Succeed"}}
            }
        });
        assert!(schema.validate(&manifest).is_empty());
    }

    #[test]
    fn rejects_wrong_api_version() {
        let schema = WorkflowSchema::embedded();
        let manifest = json!({
            "apiVersion": "v1",
            "kind": "Workflow",
            "metadata": {"name": "a"},
            "spec": {"StartAt": "a", "States": {"a": {"Type": "Succeed"}}}
        });
        assert!(!schema.validate(&manifest).is_empty());
    }
}
