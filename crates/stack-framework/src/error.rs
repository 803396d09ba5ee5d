//! # Framework Errors
//!
//! One error enum per layer: building a template, talking to a remote service,
//! and driving a stack to a terminal status. Lookup absence is not an error
//! until a caller asks for it with [`Lookup::required`](crate::locator::Lookup::required).

use crate::remote::InventoryKind;
use crate::status::StackStatus;

/// Errors raised while building or rendering a template. Always fatal to the build.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum TemplateError {
    #[error("Duplicate resource name: {0}")]
    DuplicateResourceName(String),
    #[error("Duplicate output name: {0}")]
    DuplicateOutputName(String),
    #[error("Invalid logical name {0:?}: must be non-empty and alphanumeric")]
    InvalidLogicalName(String),
    #[error("{resource} references unknown resource {target}")]
    UnknownReference { resource: String, target: String },
    #[error("Dependency cycle through {0}")]
    DependencyCycle(String),
    #[error("Template serialization failed: {0}")]
    Serialization(String),
}

/// A failed call against the remote inventory or orchestration service.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum RemoteError {
    #[error("{operation} failed: {message}")]
    CallFailed { operation: String, message: String },
    #[error("Remote service unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    pub fn call_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CallFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Raised by [`Lookup::required`](crate::locator::Lookup::required) when the caller
/// treats absence as fatal.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("No {kind} tagged Name={tag}")]
pub struct NotFound {
    pub kind: InventoryKind,
    pub tag: String,
}

/// Errors surfaced by the [`Reconciler`](crate::reconciler::Reconciler).
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ReconcileError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Stack {stack_name} finished in {status}{}", reason_suffix(.reason))]
    ReconciliationFailed {
        stack_name: String,
        status: StackStatus,
        reason: Option<String>,
    },
    #[error("Stack {stack_name} is busy ({status}); another operation is in flight")]
    StackBusy {
        stack_name: String,
        status: StackStatus,
    },
    #[error("Stack {stack_name} cannot be updated from {status}; delete it first")]
    NotUpdatable {
        stack_name: String,
        status: StackStatus,
    },
    #[error("Timed out waiting for stack {stack_name} (last status: {})", last_status_label(.last_status))]
    Timeout {
        stack_name: String,
        last_status: Option<StackStatus>,
    },
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {reason}"),
        None => String::new(),
    }
}

fn last_status_label(status: &Option<StackStatus>) -> String {
    match status {
        Some(status) => status.to_string(),
        None => "none observed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciliation_failed_message_includes_reason() {
        let err = ReconcileError::ReconciliationFailed {
            stack_name: "dev-vpc".to_string(),
            status: StackStatus::CreateFailed,
            reason: Some("Resource creation cancelled".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Stack dev-vpc finished in CREATE_FAILED: Resource creation cancelled"
        );
    }

    #[test]
    fn test_timeout_message_without_status() {
        let err = ReconcileError::Timeout {
            stack_name: "dev-vpc".to_string(),
            last_status: None,
        };
        assert!(err.to_string().ends_with("(last status: none observed)"));
    }
}
