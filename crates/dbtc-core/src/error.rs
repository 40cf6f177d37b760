//! Error types for dbtc-core

use thiserror::Error;

use crate::remote::RemoteError;
use crate::resource::RemoteId;
use crate::validate::ValidationError;

/// Core error type for dbtc
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Configuration file is not valid YAML
    #[error("[E002] Failed to parse config: {message}")]
    ConfigParse { message: String },

    /// E003: Configuration failed schema validation
    #[error("[E003] Invalid configuration ({} error(s)):\n{}", .errors.len(), join_errors(.errors))]
    Validation { errors: Vec<ValidationError> },

    /// E004: Circular dependency detected in the resource graph
    #[error("[E004] Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    /// E005: Two resources expanded to the same stable key
    #[error("[E005] Duplicate resource key: {key}")]
    DuplicateResource { key: String },

    /// E006: A remote operation failed
    #[error("[E006] {action} of {key} failed: {source}")]
    RemoteOperation {
        action: String,
        key: String,
        source: RemoteError,
    },

    /// E007: Outputs requested from a state that lacks required resources
    #[error("[E007] State is incomplete, missing: {missing}")]
    IncompleteState { missing: String },

    /// E008: A dependency is missing from the graph, or has no remote ID in
    /// state when an operation needs it
    #[error("[E008] Cannot resolve '{field}' for {key}: {dependency} is not available")]
    UnresolvedReference {
        key: String,
        field: String,
        dependency: String,
    },

    /// E009: State file contains an entry that cannot be interpreted
    #[error("[E009] Corrupt state entry '{key}': {reason}")]
    StateCorrupt { key: String, reason: String },

    /// E010: IO error
    #[error("[E010] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E011: IO error with file path context
    #[error("[E011] Failed to access '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E012: A remote operation went through but the state file was not
    /// updated; the remote ID is not recorded anywhere else
    #[error("[E012] {action} of {key} succeeded remotely (remote id {remote_id}) but state was not saved: {source}")]
    StateNotSaved {
        action: String,
        key: String,
        remote_id: RemoteId,
        source: Box<CoreError>,
    },

    /// E013: An account snapshot cannot be turned into a configuration
    #[error("[E013] Cannot import snapshot: {message}")]
    Import { message: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}
