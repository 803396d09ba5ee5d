use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ec2::error::{DisplayErrorContext, SdkError};
use aws_sdk_ec2::types::Filter;
use aws_sdk_ec2::Client;
use stack_framework::{InstanceTypePage, InventoryApi, InventoryKind, RemoteError};
use std::fmt::Debug;
use tracing::debug;

/// [`InventoryApi`] over the EC2 describe calls.
#[derive(Clone)]
pub struct Ec2Inventory {
    client: Client,
}

impl Ec2Inventory {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn name_filter(tag_value: &str) -> Filter {
    Filter::builder().name("tag:Name").values(tag_value).build()
}

#[async_trait]
impl InventoryApi for Ec2Inventory {
    async fn find_ids_by_tag(
        &self,
        kind: InventoryKind,
        tag_value: &str,
    ) -> Result<Vec<String>, RemoteError> {
        let filter = name_filter(tag_value);
        let ids: Vec<String> = match kind {
            InventoryKind::Vpc => self
                .client
                .describe_vpcs()
                .filters(filter)
                .send()
                .await
                .map_err(|err| call_failed("DescribeVpcs", &err))?
                .vpcs()
                .iter()
                .filter_map(|vpc| vpc.vpc_id().map(str::to_string))
                .collect(),
            InventoryKind::Subnet => self
                .client
                .describe_subnets()
                .filters(filter)
                .send()
                .await
                .map_err(|err| call_failed("DescribeSubnets", &err))?
                .subnets()
                .iter()
                .filter_map(|subnet| subnet.subnet_id().map(str::to_string))
                .collect(),
            InventoryKind::SecurityGroup => self
                .client
                .describe_security_groups()
                .filters(filter)
                .send()
                .await
                .map_err(|err| call_failed("DescribeSecurityGroups", &err))?
                .security_groups()
                .iter()
                .filter_map(|group| group.group_id().map(str::to_string))
                .collect(),
        };
        debug!(%kind, tag_value, count = ids.len(), "Inventory lookup");
        Ok(ids)
    }

    async fn list_instance_types(
        &self,
        next_token: Option<String>,
    ) -> Result<InstanceTypePage, RemoteError> {
        let output = self
            .client
            .describe_instance_types()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|err| call_failed("DescribeInstanceTypes", &err))?;

        Ok(InstanceTypePage {
            instance_types: output
                .instance_types()
                .iter()
                .filter_map(|info| info.instance_type().map(|t| t.as_str().to_string()))
                .collect(),
            next_token: output.next_token().map(str::to_string),
        })
    }
}

fn call_failed<E, R>(operation: &str, err: &SdkError<E, R>) -> RemoteError
where
    E: std::error::Error + 'static,
    R: Debug,
{
    RemoteError::call_failed(operation, DisplayErrorContext(err).to_string())
}
