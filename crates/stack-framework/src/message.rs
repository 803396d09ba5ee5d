//! # Orchestrator Messages
//!
//! Requests the [`OrchestratorClient`](crate::client::OrchestratorClient) sends to the
//! [`LocalOrchestrator`](crate::actor::LocalOrchestrator). Each carries a oneshot
//! sender for the reply, so the actor never shares state with its callers.

use crate::error::RemoteError;
use crate::remote::{InstanceTypePage, InventoryKind, UpdateOutcome};
use crate::status::StackRecord;
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by the orchestrator.
pub type Response<T> = oneshot::Sender<Result<T, RemoteError>>;

/// One request to the local orchestrator: the four stack operations plus the
/// two inventory queries.
#[derive(Debug)]
pub enum OrchestratorRequest {
    Describe {
        stack_name: String,
        respond_to: Response<Option<StackRecord>>,
    },
    Create {
        stack_name: String,
        template_body: String,
        respond_to: Response<()>,
    },
    Update {
        stack_name: String,
        template_body: String,
        respond_to: Response<UpdateOutcome>,
    },
    Delete {
        stack_name: String,
        respond_to: Response<()>,
    },
    FindByTag {
        kind: InventoryKind,
        tag_value: String,
        respond_to: Response<Vec<String>>,
    },
    ListInstanceTypes {
        next_token: Option<String>,
        respond_to: Response<InstanceTypePage>,
    },
}
