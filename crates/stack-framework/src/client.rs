//! # Orchestrator Client
//!
//! The caller half of the local orchestrator. It forwards every [`StackApi`] and
//! [`InventoryApi`] call over an mpsc channel and awaits the oneshot reply.

use crate::error::RemoteError;
use crate::message::OrchestratorRequest;
use crate::remote::{InstanceTypePage, InventoryApi, InventoryKind, StackApi, UpdateOutcome};
use crate::status::StackRecord;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

/// Cheap to clone: it only holds the channel sender.
#[derive(Clone, Debug)]
pub struct OrchestratorClient {
    sender: mpsc::Sender<OrchestratorRequest>,
}

impl OrchestratorClient {
    pub fn new(sender: mpsc::Sender<OrchestratorRequest>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, RemoteError>>) -> OrchestratorRequest,
    ) -> Result<T, RemoteError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| RemoteError::Unavailable("orchestrator closed".to_string()))?;
        response
            .await
            .map_err(|_| RemoteError::Unavailable("orchestrator dropped the reply".to_string()))?
    }
}

#[async_trait]
impl StackApi for OrchestratorClient {
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackRecord>, RemoteError> {
        self.request(|respond_to| OrchestratorRequest::Describe {
            stack_name: stack_name.to_string(),
            respond_to,
        })
        .await
    }

    async fn create_stack(&self, stack_name: &str, template_body: &str) -> Result<(), RemoteError> {
        self.request(|respond_to| OrchestratorRequest::Create {
            stack_name: stack_name.to_string(),
            template_body: template_body.to_string(),
            respond_to,
        })
        .await
    }

    async fn update_stack(
        &self,
        stack_name: &str,
        template_body: &str,
    ) -> Result<UpdateOutcome, RemoteError> {
        self.request(|respond_to| OrchestratorRequest::Update {
            stack_name: stack_name.to_string(),
            template_body: template_body.to_string(),
            respond_to,
        })
        .await
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<(), RemoteError> {
        self.request(|respond_to| OrchestratorRequest::Delete {
            stack_name: stack_name.to_string(),
            respond_to,
        })
        .await
    }
}

#[async_trait]
impl InventoryApi for OrchestratorClient {
    async fn find_ids_by_tag(
        &self,
        kind: InventoryKind,
        tag_value: &str,
    ) -> Result<Vec<String>, RemoteError> {
        self.request(|respond_to| OrchestratorRequest::FindByTag {
            kind,
            tag_value: tag_value.to_string(),
            respond_to,
        })
        .await
    }

    async fn list_instance_types(
        &self,
        next_token: Option<String>,
    ) -> Result<InstanceTypePage, RemoteError> {
        self.request(|respond_to| OrchestratorRequest::ListInstanceTypes {
            next_token,
            respond_to,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{create_mock_client, expect_create, expect_describe};
    use crate::status::StackStatus;

    #[tokio::test]
    async fn test_describe_round_trip_over_channel() {
        let (client, mut receiver) = create_mock_client(10);

        let describe = tokio::spawn(async move { client.describe_stack("dev-vpc").await });

        let (stack_name, responder) = expect_describe(&mut receiver)
            .await
            .expect("Expected Describe request");
        assert_eq!(stack_name, "dev-vpc");
        responder
            .send(Ok(Some(StackRecord::new("dev-vpc", StackStatus::CreateComplete))))
            .unwrap();

        let record = describe.await.unwrap().unwrap().unwrap();
        assert_eq!(record.status, StackStatus::CreateComplete);
    }

    #[tokio::test]
    async fn test_create_forwards_body() {
        let (client, mut receiver) = create_mock_client(10);

        let create =
            tokio::spawn(async move { client.create_stack("dev-vpc", "Resources: {}").await });

        let (stack_name, body, responder) = expect_create(&mut receiver)
            .await
            .expect("Expected Create request");
        assert_eq!(stack_name, "dev-vpc");
        assert_eq!(body, "Resources: {}");
        responder.send(Ok(())).unwrap();

        assert!(create.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_closed_orchestrator_is_unavailable() {
        let (client, receiver) = create_mock_client(1);
        drop(receiver);

        let err = client.delete_stack("dev-vpc").await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));
    }
}
