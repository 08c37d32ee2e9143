// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Workflow definitions: the ASL-like state machine loaded, validated and
//! bootstrapped by the control plane (§4.3, §4.5).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::errors::ErrorKind;

/// Kubernetes-style manifest envelope for a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowManifest {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: WorkflowMetadata,
    pub spec: WorkflowDefinition,
}

pub const API_VERSION: &str = "choreo.dev/v1";
pub const KIND: &str = "Workflow";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl WorkflowMetadata {
    /// DNS-label style validation: lowercase alphanumeric and hyphens,
    /// 1-63 chars, must start and end with an alphanumeric character.
    pub fn validate_name(name: &str) -> Result<(), WorkflowError> {
        if name.is_empty() || name.len() > 63 {
            return Err(WorkflowError::InvalidWorkflowName(name.to_string()));
        }
        let bytes = name.as_bytes();
        let valid_char = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-';
        if !bytes.iter().all(|&b| valid_char(b)) {
            return Err(WorkflowError::InvalidWorkflowName(name.to_string()));
        }
        let starts_ok = bytes[0].is_ascii_alphanumeric();
        let ends_ok = bytes[bytes.len() - 1].is_ascii_alphanumeric();
        if !starts_ok || !ends_ok {
            return Err(WorkflowError::InvalidWorkflowName(name.to_string()));
        }
        Ok(())
    }
}

/// A reference to an agent-flow or skill bundle to import before bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleImport {
    pub name: String,
    pub uri: String,
}

/// The ASL-like state machine body of a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(rename = "StartAt")]
    pub start_at: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(rename = "States")]
    pub states: HashMap<String, State>,
    #[serde(default)]
    pub af_imports: Vec<BundleImport>,
    #[serde(default)]
    pub skill_imports: Vec<BundleImport>,
}

/// Binds a `Task` state to the worker agent template that executes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentBinding {
    pub agent_template: String,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum State {
    Task {
        #[serde(flatten)]
        agent: AgentBinding,
        #[serde(rename = "Next", skip_serializing_if = "Option::is_none")]
        next: Option<String>,
        #[serde(rename = "End", default)]
        end: bool,
        #[serde(rename = "TimeoutSeconds", default)]
        timeout_seconds: Option<u64>,
    },
    Choice {
        #[serde(rename = "Choices")]
        choices: Vec<ChoiceRule>,
        #[serde(rename = "Default", skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    Parallel {
        #[serde(rename = "Branches")]
        branches: Vec<WorkflowDefinition>,
        #[serde(rename = "Next", skip_serializing_if = "Option::is_none")]
        next: Option<String>,
        #[serde(rename = "End", default)]
        end: bool,
    },
    Map {
        #[serde(rename = "ItemsPath")]
        items_path: String,
        #[serde(rename = "Iterator")]
        iterator: Box<WorkflowDefinition>,
        #[serde(rename = "Next", skip_serializing_if = "Option::is_none")]
        next: Option<String>,
        #[serde(rename = "End", default)]
        end: bool,
    },
    Wait {
        #[serde(rename = "Seconds")]
        seconds: u64,
        #[serde(rename = "Next", skip_serializing_if = "Option::is_none")]
        next: Option<String>,
        #[serde(rename = "End", default)]
        end: bool,
    },
    Succeed,
    Fail {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        cause: Option<String>,
    },
}

impl State {
    pub fn next_targets(&self) -> Vec<&str> {
        match self {
            State::Task { next, .. } | State::Parallel { next, .. } | State::Map { next, .. } | State::Wait { next, .. } => {
                next.as_deref().into_iter().collect()
            }
            State::Choice { choices, default } => choices
                .iter()
                .map(|c| c.next.as_str())
                .chain(default.as_deref())
                .collect(),
            State::Succeed | State::Fail { .. } => Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            State::Task { end, .. } | State::Parallel { end, .. } | State::Map { end, .. } | State::Wait { end, .. } => *end,
            State::Succeed | State::Fail { .. } => true,
            State::Choice { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceRule {
    #[serde(flatten)]
    pub condition: serde_json::Value,
    #[serde(rename = "Next")]
    pub next: String,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow has no states")]
    NoStates,
    #[error("StartAt references unknown state: {0}")]
    StartAtNotFound(String),
    #[error("Next target '{0}' references unknown state")]
    NextTargetNotFound(String),
    #[error("invalid workflow name: {0}")]
    InvalidWorkflowName(String),
    #[error("invalid state name: {0}")]
    InvalidStateName(String),
    #[error("state not found: {0}")]
    StateNotFound(String),
    #[error("invalid apiVersion: expected {expected}, got {got}")]
    InvalidApiVersion { expected: String, got: String },
    #[error("invalid kind: expected {expected}, got {got}")]
    InvalidKind { expected: String, got: String },
    #[error("cycle detected in state graph: {0}")]
    Cycle(String),
    #[error("unreachable state: {0}")]
    Unreachable(String),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::NoStates
            | WorkflowError::StartAtNotFound(_)
            | WorkflowError::NextTargetNotFound(_)
            | WorkflowError::InvalidWorkflowName(_)
            | WorkflowError::InvalidStateName(_)
            | WorkflowError::InvalidApiVersion { .. }
            | WorkflowError::InvalidKind { .. } => ErrorKind::InvalidInput,
            WorkflowError::StateNotFound(_) => ErrorKind::NotFound,
            WorkflowError::Cycle(_) | WorkflowError::Unreachable(_) => ErrorKind::GraphError,
        }
    }
}

impl WorkflowDefinition {
    pub fn validate_structure(&self) -> Result<(), WorkflowError> {
        if self.states.is_empty() {
            return Err(WorkflowError::NoStates);
        }
        if !self.states.contains_key(&self.start_at) {
            return Err(WorkflowError::StartAtNotFound(self.start_at.clone()));
        }
        for state in self.states.values() {
            for target in state.next_targets() {
                if !self.states.contains_key(target) {
                    return Err(WorkflowError::NextTargetNotFound(target.to_string()));
                }
            }
        }
        self.check_for_cycles()?;
        self.check_reachability()?;
        Ok(())
    }

    /// Plain DFS cycle check over the Next/Choice/Parallel/Map edges.
    pub fn check_for_cycles(&self) -> Result<(), WorkflowError> {
        let mut visited: HashMap<&str, bool> = HashMap::new();
        let mut rec_stack: HashMap<&str, bool> = HashMap::new();

        fn visit<'a>(
            name: &'a str,
            states: &'a HashMap<String, State>,
            visited: &mut HashMap<&'a str, bool>,
            rec_stack: &mut HashMap<&'a str, bool>,
        ) -> Result<(), WorkflowError> {
            if *rec_stack.get(name).unwrap_or(&false) {
                return Err(WorkflowError::Cycle(name.to_string()));
            }
            if *visited.get(name).unwrap_or(&false) {
                return Ok(());
            }
            visited.insert(name, true);
            rec_stack.insert(name, true);
            if let Some(state) = states.get(name) {
                for target in state.next_targets() {
                    visit(target, states, visited, rec_stack)?;
                }
            }
            rec_stack.insert(name, false);
            Ok(())
        }

        for name in self.states.keys() {
            visit(name, &self.states, &mut visited, &mut rec_stack)?;
        }
        Ok(())
    }

    fn check_reachability(&self) -> Result<(), WorkflowError> {
        let mut reachable: HashSet<&str> = HashSet::new();
        let mut stack = vec![self.start_at.as_str()];
        while let Some(name) = stack.pop() {
            if !reachable.insert(name) {
                continue;
            }
            if let Some(state) = self.states.get(name) {
                stack.extend(state.next_targets());
            }
        }
        for name in self.states.keys() {
            if !reachable.contains(name.as_str()) {
                return Err(WorkflowError::Unreachable(name.clone()));
            }
        }
        Ok(())
    }

    /// Upstream/downstream adjacency for every `Task` state, used to seed
    /// `WorkflowMeta.deps` at bootstrap (§4.3).
    pub fn task_dependency_edges(&self) -> HashMap<String, (Vec<String>, Vec<String>)> {
        let mut edges: HashMap<String, (Vec<String>, Vec<String>)> = self
            .states
            .keys()
            .map(|k| (k.clone(), (Vec::new(), Vec::new())))
            .collect();
        for (name, state) in &self.states {
            for target in state.next_targets() {
                if let Some(entry) = edges.get_mut(target) {
                    entry.0.push(name.clone());
                }
                if let Some(entry) = edges.get_mut(name.as_str()) {
                    entry.1.push(target.to_string());
                }
            }
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(next: Option<&str>, end: bool) -> State {
        State::Task {
            agent: AgentBinding {
                agent_template: "worker".into(),
                skills: vec![],
            },
            next: next.map(String::from),
            end,
            timeout_seconds: None,
        }
    }

    #[test]
    fn workflow_name_validation() {
        assert!(WorkflowMetadata::validate_name("order-pipeline").is_ok());
        assert!(WorkflowMetadata::validate_name("-bad").is_err());
        assert!(WorkflowMetadata::validate_name("Bad_Name").is_err());
        assert!(WorkflowMetadata::validate_name("").is_err());
    }

    #[test]
    fn rejects_empty_states() {
        let def = WorkflowDefinition {
            start_at: "a".into(),
            comment: None,
            states: HashMap::new(),
            af_imports: vec![],
            skill_imports: vec![],
        };
        assert!(matches!(def.validate_structure(), Err(WorkflowError::NoStates)));
    }

    #[test]
    fn detects_missing_start_at() {
        let mut states = HashMap::new();
        states.insert("a".to_string(), task(None, true));
        let def = WorkflowDefinition {
            start_at: "missing".into(),
            comment: None,
            states,
            af_imports: vec![],
            skill_imports: vec![],
        };
        assert!(matches!(def.validate_structure(), Err(WorkflowError::StartAtNotFound(_))));
    }

    #[test]
    fn detects_cycle() {
        let mut states = HashMap::new();
        states.insert("a".to_string(), task(Some("b"), false));
        states.insert("b".to_string(), task(Some("a"), false));
        let def = WorkflowDefinition {
            start_at: "a".into(),
            comment: None,
            states,
            af_imports: vec![],
            skill_imports: vec![],
        };
        assert!(matches!(def.validate_structure(), Err(WorkflowError::Cycle(_))));
    }

    #[test]
    fn accepts_linear_workflow() {
        let mut states = HashMap::new();
        states.insert("a".to_string(), task(Some("b"), false));
        states.insert("b".to_string(), task(None, true));
        let def = WorkflowDefinition {
            start_at: "a".into(),
            comment: None,
            states,
            af_imports: vec![],
            skill_imports: vec![],
        };
        assert!(def.validate_structure().is_ok());
    }
}
