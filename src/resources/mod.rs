//! # Resource Kinds
//!
//! Typed definitions for the AWS resources the deployment templates use. Each
//! implements [`Resource`](stack_framework::Resource); fields that point at
//! another resource are [`ResourceRef`](stack_framework::ResourceRef)s of the
//! right kind, so they accept either a handle from the same template or a
//! physical id found by the locator.

pub mod ec2;
pub mod route53;

pub use ec2::{
    Eip, IngressRule, Instance, InternetGateway, NatGateway, Route, RouteTable, RouteTarget,
    SecurityGroup, Subnet, SubnetRouteTableAssociation, Vpc, VpcGatewayAttachment,
};
pub use route53::{HostedZone, HostedZoneVpc};
