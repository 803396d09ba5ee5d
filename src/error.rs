use crate::config::ConfigError;
use stack_framework::{NotFound, ReconcileError, RemoteError, TemplateError};

/// Errors from a deployment command.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Missing prerequisite: {0}")]
    NotFound(#[from] NotFound),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("Instance type {0} is not offered in this region")]
    UnknownInstanceType(String),
}
