//! # Remote Service Traits
//!
//! The two seams between this crate and a provider: [`InventoryApi`] for read-only
//! resource queries and [`StackApi`] for the stack orchestrator. Production
//! adapters, the local orchestrator client and the mocks all implement them.

use crate::error::RemoteError;
use crate::status::StackRecord;
use async_trait::async_trait;
use std::fmt::{self, Display};

/// Inventory collections the locator can query by tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InventoryKind {
    Vpc,
    Subnet,
    SecurityGroup,
}

impl InventoryKind {
    /// The template resource type that produces items of this kind.
    pub fn resource_type(self) -> &'static str {
        match self {
            Self::Vpc => "AWS::EC2::VPC",
            Self::Subnet => "AWS::EC2::Subnet",
            Self::SecurityGroup => "AWS::EC2::SecurityGroup",
        }
    }

    pub fn from_resource_type(resource_type: &str) -> Option<Self> {
        match resource_type {
            "AWS::EC2::VPC" => Some(Self::Vpc),
            "AWS::EC2::Subnet" => Some(Self::Subnet),
            "AWS::EC2::SecurityGroup" => Some(Self::SecurityGroup),
            _ => None,
        }
    }

    /// Physical id prefix used by the provider (`vpc-`, `subnet-`, `sg-`).
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Vpc => "vpc",
            Self::Subnet => "subnet",
            Self::SecurityGroup => "sg",
        }
    }
}

impl Display for InventoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vpc => "VPC",
            Self::Subnet => "subnet",
            Self::SecurityGroup => "security group",
        })
    }
}

/// One page of the instance-type listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceTypePage {
    pub instance_types: Vec<String>,
    pub next_token: Option<String>,
}

/// Read-only inventory queries.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// Ids of every `kind` item whose `Name` tag equals `tag_value`, in the order
    /// the service returned them.
    async fn find_ids_by_tag(
        &self,
        kind: InventoryKind,
        tag_value: &str,
    ) -> Result<Vec<String>, RemoteError>;

    /// One page of available compute-instance types.
    async fn list_instance_types(
        &self,
        next_token: Option<String>,
    ) -> Result<InstanceTypePage, RemoteError>;
}

/// What the orchestrator did with an update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Started,
    /// The submitted document matches the deployed one.
    NoChanges,
}

/// Stack orchestration operations keyed by stack name.
///
/// Implementations must not serialize concurrent mutations themselves; callers
/// guarantee one in-flight mutation per stack name.
#[async_trait]
pub trait StackApi: Send + Sync {
    /// `Ok(None)` means the stack does not exist. Every other failure is an error.
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackRecord>, RemoteError>;

    async fn create_stack(&self, stack_name: &str, template_body: &str) -> Result<(), RemoteError>;

    async fn update_stack(
        &self,
        stack_name: &str,
        template_body: &str,
    ) -> Result<UpdateOutcome, RemoteError>;

    async fn delete_stack(&self, stack_name: &str) -> Result<(), RemoteError>;
}
