//! Shared error taxonomy for the control plane.
//!
//! Every component-level error enum exposes a [`kind()`](ToolError::kind) accessor that
//! maps onto one of these taxonomy strings. The tool surface uses `kind()` (not the
//! `Display` message) to populate the `error_kind` field of a tool result, so the
//! taxonomy stays stable even as error messages change.

use thiserror::Error;

/// The error-kind taxonomy exposed to tool callers. Not a type name — a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    DependencyMissing,
    ConnectionFailed,
    NotFound,
    SchemaError,
    UnresolvedReference,
    GraphError,
    LeaseHeld,
    LeaseMismatch,
    LeaseExpired,
    OwnerMismatch,
    NotReady,
    Conflict,
    BackendError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::DependencyMissing => "dependency_missing",
            ErrorKind::ConnectionFailed => "connection_failed",
            ErrorKind::NotFound => "not_found",
            ErrorKind::SchemaError => "schema_error",
            ErrorKind::UnresolvedReference => "unresolved_reference",
            ErrorKind::GraphError => "graph_error",
            ErrorKind::LeaseHeld => "lease_held",
            ErrorKind::LeaseMismatch => "lease_mismatch",
            ErrorKind::LeaseExpired => "lease_expired",
            ErrorKind::OwnerMismatch => "owner_mismatch",
            ErrorKind::NotReady => "not_ready",
            ErrorKind::Conflict => "conflict",
            ErrorKind::BackendError => "backend_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors surfaced by the document-store adapter (§4.1).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store dependency unavailable: {0}")]
    DependencyMissing(String),

    #[error("failed to reach document store: {0}")]
    ConnectionFailed(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("lease token mismatch")]
    LeaseMismatch,

    #[error("concurrent write conflict, retry")]
    Conflict,

    #[error("document store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::DependencyMissing(_) => ErrorKind::DependencyMissing,
            StoreError::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            StoreError::LeaseMismatch => ErrorKind::LeaseMismatch,
            StoreError::Conflict => ErrorKind::Conflict,
            StoreError::Backend(_) => ErrorKind::BackendError,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::InvalidInput(err.to_string())
    }
}

/// Errors surfaced by the agent-runtime adapter.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("agent runtime dependency unavailable: {0}")]
    DependencyMissing(String),

    #[error("failed to reach agent runtime: {0}")]
    ConnectionFailed(String),

    #[error("agent not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidInput(String),

    #[error("agent runtime backend error: {0}")]
    Backend(String),
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::DependencyMissing(_) => ErrorKind::DependencyMissing,
            RuntimeError::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            RuntimeError::NotFound(_) => ErrorKind::NotFound,
            RuntimeError::InvalidInput(_) => ErrorKind::InvalidInput,
            RuntimeError::Backend(_) => ErrorKind::BackendError,
        }
    }
}

/// Errors surfaced by the lease manager (§4.2).
#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("upstream dependencies not satisfied")]
    NotReady,

    #[error("meta.agents assignment does not match owner_agent_id")]
    OwnerMismatch,

    #[error("existing lease is active")]
    LeaseHeld,

    #[error("lease token does not match current holder")]
    LeaseMismatch,

    #[error("lease has expired")]
    LeaseExpired,

    #[error("concurrent write conflict, retry")]
    Conflict,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LeaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LeaseError::NotReady => ErrorKind::NotReady,
            LeaseError::OwnerMismatch => ErrorKind::OwnerMismatch,
            LeaseError::LeaseHeld => ErrorKind::LeaseHeld,
            LeaseError::LeaseMismatch => ErrorKind::LeaseMismatch,
            LeaseError::LeaseExpired => ErrorKind::LeaseExpired,
            LeaseError::Conflict => ErrorKind::Conflict,
            LeaseError::Store(e) => e.kind(),
        }
    }
}
