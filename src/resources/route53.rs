//! Route 53 resource kinds.

use super::ec2::Vpc;
use stack_framework::{Properties, PseudoParameter, Resource, ResourceRef, Tags, Value};

/// A VPC association for a private hosted zone.
#[derive(Debug, Clone)]
pub struct HostedZoneVpc {
    pub vpc: ResourceRef<Vpc>,
    pub region: Value,
}

impl HostedZoneVpc {
    /// Associates `vpc` in the region the stack is deployed to.
    pub fn in_current_region(vpc: ResourceRef<Vpc>) -> Self {
        Self {
            vpc,
            region: PseudoParameter::Region.into(),
        }
    }
}

impl From<&HostedZoneVpc> for Value {
    fn from(association: &HostedZoneVpc) -> Self {
        Value::map([
            ("VPCId", Value::from(&association.vpc)),
            ("VPCRegion", association.region.clone()),
        ])
    }
}

/// A hosted zone. It is private as soon as it has at least one VPC.
#[derive(Debug, Clone)]
pub struct HostedZone {
    pub name: String,
    pub comment: Option<String>,
    pub tags: Tags,
    pub vpcs: Vec<HostedZoneVpc>,
}

impl Resource for HostedZone {
    const RESOURCE_TYPE: &'static str = "AWS::Route53::HostedZone";

    fn properties(&self) -> Properties {
        let config = self
            .comment
            .as_deref()
            .map(|comment| Value::map([("Comment", comment)]));
        let vpcs: Vec<Value> = self.vpcs.iter().map(Value::from).collect();
        let properties = Properties::new()
            .with("Name", self.name.as_str())
            .with_opt("HostedZoneConfig", config)
            .with_tags("HostedZoneTags", self.tags.clone());
        if vpcs.is_empty() {
            properties
        } else {
            properties.with("VPCs", vpcs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_zone_binds_vpc_in_current_region() {
        let zone = HostedZone {
            name: "dev.internal".into(),
            comment: Some("Private Hosted Zone for [dev.internal]".into()),
            tags: Tags::named("dev.internal"),
            vpcs: vec![HostedZoneVpc::in_current_region(ResourceRef::existing(
                "vpc-1",
            ))],
        };

        let properties = zone.properties();
        assert_eq!(
            properties.get("VPCs"),
            Some(&Value::List(vec![Value::map([
                ("VPCId", Value::from("vpc-1")),
                ("VPCRegion", Value::Pseudo(PseudoParameter::Region)),
            ])]))
        );
        assert_eq!(
            properties.get("HostedZoneConfig"),
            Some(&Value::map([(
                "Comment",
                "Private Hosted Zone for [dev.internal]"
            )]))
        );
    }

    #[test]
    fn test_public_zone_has_no_vpcs() {
        let zone = HostedZone {
            name: "example.com".into(),
            comment: None,
            tags: Tags::new(),
            vpcs: Vec::new(),
        };
        let properties = zone.properties();
        assert_eq!(properties.len(), 1);
        assert!(properties.get("VPCs").is_none());
    }
}
