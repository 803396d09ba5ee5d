use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::types::Stack;
use aws_sdk_cloudformation::Client;
use stack_framework::{RemoteError, StackApi, StackRecord, StackStatus, UpdateOutcome};
use std::fmt::Debug;
use tracing::{debug, info};

/// [`StackApi`] over the CloudFormation service.
///
/// `describe_stack` does not fetch the template body, so records carry
/// `template_body: None`.
#[derive(Clone)]
pub struct CloudFormationStacks {
    client: Client,
}

impl CloudFormationStacks {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl StackApi for CloudFormationStacks {
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackRecord>, RemoteError> {
        let output = match self.client.describe_stacks().stack_name(stack_name).send().await {
            Ok(output) => output,
            Err(err) if is_validation_error(&err, "does not exist") => {
                debug!(stack_name, "Stack does not exist");
                return Ok(None);
            }
            Err(err) => return Err(call_failed("DescribeStacks", &err)),
        };

        Ok(output
            .stacks()
            .first()
            .map(|stack| to_record(stack_name, stack)))
    }

    async fn create_stack(&self, stack_name: &str, template_body: &str) -> Result<(), RemoteError> {
        let output = self
            .client
            .create_stack()
            .stack_name(stack_name)
            .template_body(template_body)
            .send()
            .await
            .map_err(|err| call_failed("CreateStack", &err))?;
        info!(stack_name, stack_id = output.stack_id().unwrap_or_default(), "Create submitted");
        Ok(())
    }

    async fn update_stack(
        &self,
        stack_name: &str,
        template_body: &str,
    ) -> Result<UpdateOutcome, RemoteError> {
        match self
            .client
            .update_stack()
            .stack_name(stack_name)
            .template_body(template_body)
            .send()
            .await
        {
            Ok(_) => Ok(UpdateOutcome::Started),
            Err(err) if is_validation_error(&err, "No updates are to be performed") => {
                Ok(UpdateOutcome::NoChanges)
            }
            Err(err) => Err(call_failed("UpdateStack", &err)),
        }
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<(), RemoteError> {
        self.client
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|err| call_failed("DeleteStack", &err))?;
        Ok(())
    }
}

fn to_record(stack_name: &str, stack: &Stack) -> StackRecord {
    let status = stack
        .stack_status()
        .map(|status| match status.as_str().parse::<StackStatus>() {
            Ok(status) => status,
            Err(never) => match never {},
        })
        .unwrap_or_else(|| StackStatus::Unknown(String::new()));

    let mut record = StackRecord::new(stack.stack_name().unwrap_or(stack_name), status);
    if let Some(reason) = stack.stack_status_reason() {
        record = record.with_reason(reason);
    }
    record.outputs = stack
        .outputs()
        .iter()
        .filter_map(|output| {
            Some((
                output.output_key()?.to_string(),
                output.output_value()?.to_string(),
            ))
        })
        .collect();
    record
}

/// CloudFormation reports both "stack does not exist" and "no updates" as a
/// `ValidationError` distinguished only by its message.
fn is_validation_error<E, R>(err: &SdkError<E, R>, needle: &str) -> bool
where
    E: ProvideErrorMetadata,
{
    err.code() == Some("ValidationError") && err.message().is_some_and(|m| m.contains(needle))
}

fn call_failed<E, R>(operation: &str, err: &SdkError<E, R>) -> RemoteError
where
    E: std::error::Error + 'static,
    R: Debug,
{
    RemoteError::call_failed(operation, DisplayErrorContext(err).to_string())
}
