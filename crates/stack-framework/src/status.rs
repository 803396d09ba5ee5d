//! # Stack Status
//!
//! The orchestrator's view of a stack: its [`StackStatus`] and the transient
//! [`StackRecord`] returned by a describe call.

use std::fmt::{self, Display};
use std::str::FromStr;

/// Every status the orchestrator reports for a stack.
///
/// Statuses we do not recognise are kept verbatim in [`StackStatus::Unknown`]
/// rather than rejected, so a newer service version never breaks polling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StackStatus {
    CreateInProgress,
    CreateFailed,
    CreateComplete,
    RollbackInProgress,
    RollbackFailed,
    RollbackComplete,
    DeleteInProgress,
    DeleteFailed,
    DeleteComplete,
    UpdateInProgress,
    UpdateCompleteCleanupInProgress,
    UpdateComplete,
    UpdateFailed,
    UpdateRollbackInProgress,
    UpdateRollbackFailed,
    UpdateRollbackCompleteCleanupInProgress,
    UpdateRollbackComplete,
    ReviewInProgress,
    ImportInProgress,
    ImportComplete,
    ImportRollbackInProgress,
    ImportRollbackFailed,
    ImportRollbackComplete,
    Unknown(String),
}

impl StackStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateFailed => "CREATE_FAILED",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            Self::RollbackFailed => "ROLLBACK_FAILED",
            Self::RollbackComplete => "ROLLBACK_COMPLETE",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::UpdateFailed => "UPDATE_FAILED",
            Self::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            Self::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            Self::UpdateRollbackCompleteCleanupInProgress => {
                "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
            }
            Self::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            Self::ReviewInProgress => "REVIEW_IN_PROGRESS",
            Self::ImportInProgress => "IMPORT_IN_PROGRESS",
            Self::ImportComplete => "IMPORT_COMPLETE",
            Self::ImportRollbackInProgress => "IMPORT_ROLLBACK_IN_PROGRESS",
            Self::ImportRollbackFailed => "IMPORT_ROLLBACK_FAILED",
            Self::ImportRollbackComplete => "IMPORT_ROLLBACK_COMPLETE",
            Self::Unknown(raw) => raw,
        }
    }

    /// No further transition happens without a new submitted operation.
    pub fn is_terminal(&self) -> bool {
        let raw = self.as_str();
        raw.ends_with("_COMPLETE") || raw.ends_with("_FAILED")
    }

    /// Terminal statuses that mean the last operation applied cleanly.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::CreateComplete | Self::UpdateComplete | Self::ImportComplete
        )
    }

    /// Whether an update may be submitted against a stack in this status.
    ///
    /// A stack whose creation rolled back, or whose update rollback failed,
    /// only accepts a delete.
    pub fn accepts_update(&self) -> bool {
        matches!(
            self,
            Self::CreateComplete
                | Self::UpdateComplete
                | Self::UpdateRollbackComplete
                | Self::ImportComplete
                | Self::ImportRollbackComplete
        )
    }
}

impl Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "CREATE_FAILED" => Self::CreateFailed,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "ROLLBACK_IN_PROGRESS" => Self::RollbackInProgress,
            "ROLLBACK_FAILED" => Self::RollbackFailed,
            "ROLLBACK_COMPLETE" => Self::RollbackComplete,
            "DELETE_IN_PROGRESS" => Self::DeleteInProgress,
            "DELETE_FAILED" => Self::DeleteFailed,
            "DELETE_COMPLETE" => Self::DeleteComplete,
            "UPDATE_IN_PROGRESS" => Self::UpdateInProgress,
            "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS" => Self::UpdateCompleteCleanupInProgress,
            "UPDATE_COMPLETE" => Self::UpdateComplete,
            "UPDATE_FAILED" => Self::UpdateFailed,
            "UPDATE_ROLLBACK_IN_PROGRESS" => Self::UpdateRollbackInProgress,
            "UPDATE_ROLLBACK_FAILED" => Self::UpdateRollbackFailed,
            "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS" => {
                Self::UpdateRollbackCompleteCleanupInProgress
            }
            "UPDATE_ROLLBACK_COMPLETE" => Self::UpdateRollbackComplete,
            "REVIEW_IN_PROGRESS" => Self::ReviewInProgress,
            "IMPORT_IN_PROGRESS" => Self::ImportInProgress,
            "IMPORT_COMPLETE" => Self::ImportComplete,
            "IMPORT_ROLLBACK_IN_PROGRESS" => Self::ImportRollbackInProgress,
            "IMPORT_ROLLBACK_FAILED" => Self::ImportRollbackFailed,
            "IMPORT_ROLLBACK_COMPLETE" => Self::ImportRollbackComplete,
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// A transient read of a stack as the orchestrator reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct StackRecord {
    pub name: String,
    pub status: StackStatus,
    pub status_reason: Option<String>,
    /// Last submitted document body, when the backend reports it.
    pub template_body: Option<String>,
    pub outputs: Vec<(String, String)>,
}

impl StackRecord {
    pub fn new(name: impl Into<String>, status: StackStatus) -> Self {
        Self {
            name: name.into(),
            status,
            status_reason: None,
            template_body: None,
            outputs: Vec::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.status_reason = Some(reason.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.template_body = Some(body.into());
        self
    }

    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        for status in [
            StackStatus::CreateComplete,
            StackStatus::CreateFailed,
            StackStatus::RollbackComplete,
            StackStatus::UpdateRollbackComplete,
            StackStatus::DeleteFailed,
        ] {
            assert!(status.is_terminal(), "{status} should be terminal");
        }
        for status in [
            StackStatus::CreateInProgress,
            StackStatus::UpdateCompleteCleanupInProgress,
            StackStatus::UpdateRollbackCompleteCleanupInProgress,
            StackStatus::ReviewInProgress,
        ] {
            assert!(!status.is_terminal(), "{status} should not be terminal");
        }
    }

    #[test]
    fn test_parse_round_trips_known_and_unknown() {
        let parsed: StackStatus = "UPDATE_ROLLBACK_COMPLETE".parse().unwrap();
        assert_eq!(parsed, StackStatus::UpdateRollbackComplete);

        let unknown: StackStatus = "SOMETHING_NEW".parse().unwrap();
        assert_eq!(unknown, StackStatus::Unknown("SOMETHING_NEW".to_string()));
        assert!(!unknown.accepts_update());
    }

    #[test]
    fn test_rolled_back_create_does_not_accept_update() {
        assert!(StackStatus::RollbackComplete.is_terminal());
        assert!(!StackStatus::RollbackComplete.is_success());
        assert!(!StackStatus::RollbackComplete.accepts_update());
        assert!(StackStatus::UpdateRollbackComplete.accepts_update());
    }
}
