//! # AWS Adapters
//!
//! Production implementations of the framework's remote seams:
//! [`CloudFormationStacks`] for [`StackApi`](stack_framework::StackApi) and
//! [`Ec2Inventory`] for [`InventoryApi`](stack_framework::InventoryApi).
//! Credentials come from the default provider chain.

mod cloudformation;
mod ec2;

pub use cloudformation::CloudFormationStacks;
pub use ec2::Ec2Inventory;

use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Loads the shared SDK configuration pinned to `region`.
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}
