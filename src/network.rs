//! # Network Template
//!
//! Builds the VPC stack: one VPC with an internet gateway, two public and two
//! private subnets across two availability zones, a NAT gateway in a dedicated
//! public subnet, a base security group and a private hosted zone.
//!
//! | Subnet | CIDR | Zone | Route table |
//! |--------|------|------|-------------|
//! | `PublicWebSubnet1a` | `{octet}.1.0/24` | a | public |
//! | `PublicSvcSubnet1b` | `{octet}.2.0/24` | b | public |
//! | `PublicEIPSubnet1b` | `{octet}.30.0/24` | b | public (hosts the NAT gateway) |
//! | `PrivateDbSubnet1a` | `{octet}.11.0/24` | a | private (via NAT) |
//! | `PrivateSvcSubnet1b` | `{octet}.12.0/24` | b | private (via NAT) |
//!
//! Every subnet is tagged `Name = "{vpc_name}-{logical name}"`, which is what
//! [`ResourceLocator::find_subnet`](stack_framework::ResourceLocator::find_subnet)
//! searches for.

use crate::config::NetworkSettings;
use crate::resources::{
    Eip, HostedZone, HostedZoneVpc, IngressRule, InternetGateway, NatGateway, Route, RouteTable,
    RouteTarget, SecurityGroup, Subnet, SubnetRouteTableAssociation, Vpc, VpcGatewayAttachment,
};
use stack_framework::{Handle, Output, ResourceRef, Tags, Template, TemplateError};
use std::collections::BTreeMap;
use tracing::debug;

/// One subnet plus its route-table association.
#[derive(Debug, Clone, PartialEq)]
pub struct SubnetConfig {
    pub name: String,
    pub cidr_block: String,
    pub availability_zone: Option<String>,
    pub map_public_ip_on_launch: bool,
    /// Value of the `subnet_type` tag, e.g. `public_web`.
    pub subnet_type: String,
    /// Logical name of the association resource.
    pub association_name: String,
}

impl SubnetConfig {
    pub fn new(
        name: impl Into<String>,
        cidr_block: impl Into<String>,
        availability_zone: impl Into<String>,
        subnet_type: impl Into<String>,
        association_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            cidr_block: cidr_block.into(),
            availability_zone: Some(availability_zone.into()),
            map_public_ip_on_launch: false,
            subnet_type: subnet_type.into(),
            association_name: association_name.into(),
        }
    }

    pub fn public(mut self) -> Self {
        self.map_public_ip_on_launch = true;
        self
    }
}

/// Adds one subnet and one route-table association per config.
///
/// Returns the subnet handles keyed by logical name. Each pair is checked
/// before either half is added, so a failing config never leaves a subnet
/// without its association. Pairs added before the failing config stay.
pub fn add_subnets(
    template: &mut Template,
    vpc: &ResourceRef<Vpc>,
    environment: &str,
    configs: &[SubnetConfig],
    route_table: &Handle<RouteTable>,
) -> Result<BTreeMap<String, Handle<Subnet>>, TemplateError> {
    let mut subnets = BTreeMap::new();
    for config in configs {
        let subnet = add_subnet(template, vpc, environment, config, route_table)?;
        subnets.insert(config.name.clone(), subnet);
    }
    Ok(subnets)
}

fn add_subnet(
    template: &mut Template,
    vpc: &ResourceRef<Vpc>,
    environment: &str,
    config: &SubnetConfig,
    route_table: &Handle<RouteTable>,
) -> Result<Handle<Subnet>, TemplateError> {
    template.check_available(&config.name)?;
    template.check_available(&config.association_name)?;
    if config.association_name == config.name {
        return Err(TemplateError::DuplicateResourceName(
            config.association_name.clone(),
        ));
    }

    let subnet = template.add_resource(
        config.name.as_str(),
        Subnet {
            vpc: vpc.clone(),
            cidr_block: config.cidr_block.clone(),
            availability_zone: config.availability_zone.clone(),
            map_public_ip_on_launch: config.map_public_ip_on_launch,
            tags: Tags::named(format!("{environment}-{}", config.name))
                .with("subnet_type", config.subnet_type.as_str()),
        },
    )?;
    template.add_resource(
        config.association_name.as_str(),
        SubnetRouteTableAssociation {
            subnet: (&subnet).into(),
            route_table: route_table.into(),
        },
    )?;
    Ok(subnet)
}

/// Inputs of the network template.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    pub vpc_name: String,
    pub region: String,
    pub hosted_zone: String,
    pub octet: String,
    pub security_group_name: String,
}

impl NetworkConfig {
    pub fn from_settings(settings: &NetworkSettings, region: &str) -> Self {
        Self {
            vpc_name: settings.vpc_name.clone(),
            region: region.to_string(),
            hosted_zone: settings.hosted_zone.clone(),
            octet: settings.octet.clone(),
            security_group_name: settings.security_group_name.clone(),
        }
    }

    pub fn vpc_cidr(&self) -> String {
        format!("{}.0.0/16", self.octet)
    }

    fn cidr(&self, third: u8) -> String {
        format!("{}.{third}.0/24", self.octet)
    }

    fn zone(&self, suffix: char) -> String {
        format!("{}{suffix}", self.region)
    }

    pub fn public_subnets(&self) -> Vec<SubnetConfig> {
        vec![
            SubnetConfig::new(
                "PublicWebSubnet1a",
                self.cidr(1),
                self.zone('a'),
                "public_web",
                "PublicRouteTableAssociationWeb1a",
            )
            .public(),
            SubnetConfig::new(
                "PublicSvcSubnet1b",
                self.cidr(2),
                self.zone('b'),
                "public_svc",
                "PublicRouteTableAssociationSvc1b",
            )
            .public(),
        ]
    }

    pub fn eip_subnet(&self) -> SubnetConfig {
        SubnetConfig::new(
            "PublicEIPSubnet1b",
            self.cidr(30),
            self.zone('b'),
            "public_eip",
            "PublicSubnetEIPRouteTableAssociation",
        )
        .public()
    }

    pub fn private_subnets(&self) -> Vec<SubnetConfig> {
        vec![
            SubnetConfig::new(
                "PrivateDbSubnet1a",
                self.cidr(11),
                self.zone('a'),
                "private_db",
                "PrivateRouteTableAssociationDb1a",
            ),
            SubnetConfig::new(
                "PrivateSvcSubnet1b",
                self.cidr(12),
                self.zone('b'),
                "private_svc",
                "PrivateRouteTableAssociationSvc1b",
            ),
        ]
    }
}

/// Builds the full network template.
pub fn build_network_template(config: &NetworkConfig) -> Result<Template, TemplateError> {
    let vpc_name = config.vpc_name.as_str();
    let mut template = Template::new().with_description(format!(
        "Network for {vpc_name}: VPC {} with public and private subnets",
        config.vpc_cidr()
    ));

    // VPC, internet gateway and attachment
    let vpc = template.add_resource(
        "VPC",
        Vpc {
            cidr_block: config.vpc_cidr(),
            enable_dns_support: true,
            enable_dns_hostnames: true,
            tags: Tags::named(vpc_name),
        },
    )?;
    let vpc_ref = ResourceRef::from(&vpc);
    let gateway = template.add_resource(
        "InternetGateway",
        InternetGateway {
            tags: Tags::named(format!("{vpc_name}-InternetGateway")),
        },
    )?;
    let attachment = template.add_resource(
        "VPCGatewayAttachment",
        VpcGatewayAttachment {
            vpc: vpc_ref.clone(),
            internet_gateway: (&gateway).into(),
        },
    )?;
    template.depends_on(&attachment, &vpc)?;
    template.depends_on(&attachment, &gateway)?;

    // Public routing
    let public_table = template.add_resource(
        "PublicRouteTable",
        RouteTable {
            vpc: vpc_ref.clone(),
            tags: Tags::named(format!("{vpc_name}-PublicRouteTable")),
        },
    )?;
    let public_route = template.add_resource(
        "PublicInternetTrafficRoute",
        Route {
            route_table: (&public_table).into(),
            destination_cidr_block: "0.0.0.0/0".to_string(),
            target: RouteTarget::InternetGateway((&gateway).into()),
        },
    )?;
    template.depends_on(&public_route, &attachment)?;

    let mut subnets = add_subnets(
        &mut template,
        &vpc_ref,
        vpc_name,
        &config.public_subnets(),
        &public_table,
    )?;

    // NAT gateway in its own public subnet
    let eip_config = config.eip_subnet();
    let eip_subnet = add_subnet(&mut template, &vpc_ref, vpc_name, &eip_config, &public_table)?;
    template.depends_on(&eip_subnet, &vpc)?;
    subnets.insert(eip_config.name, eip_subnet.clone());

    let eip = template.add_resource(
        "EIPforNatGateway",
        Eip {
            domain: "vpc".to_string(),
            tags: Tags::named(format!("{vpc_name}-EIPNatGateway")),
        },
    )?;
    template.depends_on(&eip, &attachment)?;

    let nat = template.add_resource(
        "NatGateway",
        NatGateway {
            eip,
            subnet: eip_subnet.into(),
            tags: Tags::named(format!("{vpc_name}-NatGateway")),
        },
    )?;

    // Private routing
    let private_table = template.add_resource(
        "PrivateRouteTable",
        RouteTable {
            vpc: vpc_ref.clone(),
            tags: Tags::named(format!("{vpc_name}-PrivateRouteTable")),
        },
    )?;
    let private_route = template.add_resource(
        "PrivateRoute",
        Route {
            route_table: (&private_table).into(),
            destination_cidr_block: "0.0.0.0/0".to_string(),
            target: RouteTarget::NatGateway((&nat).into()),
        },
    )?;
    template.depends_on(&private_route, &attachment)?;

    subnets.extend(add_subnets(
        &mut template,
        &vpc_ref,
        vpc_name,
        &config.private_subnets(),
        &private_table,
    )?);

    let security_group = template.add_resource(
        "BaseSecurityGroup",
        SecurityGroup {
            group_description: format!("Base security group for {vpc_name}"),
            vpc: vpc_ref.clone(),
            ingress: vec![IngressRule::tcp(22, config.vpc_cidr())],
            tags: Tags::named(config.security_group_name.as_str()),
        },
    )?;

    template.add_resource(
        "PrivateHostedZone",
        HostedZone {
            name: config.hosted_zone.clone(),
            comment: Some(format!("Private Hosted Zone for [{}]", config.hosted_zone)),
            tags: Tags::named(config.hosted_zone.as_str()),
            vpcs: vec![HostedZoneVpc::in_current_region(vpc_ref)],
        },
    )?;

    // Outputs
    template.add_output(
        "VpcId",
        Output::new(&vpc)
            .with_description(format!("{vpc_name} VPC"))
            .with_export(format!("{vpc_name}-VpcId")),
    )?;
    for (name, subnet) in &subnets {
        template.add_output(
            format!("{name}Id"),
            Output::new(subnet).with_export(format!("{vpc_name}-{name}Id")),
        )?;
    }
    template.add_output(
        "SecurityGroupId",
        Output::new(&security_group).with_export(format!("{vpc_name}-SecurityGroupId")),
    )?;

    debug!(vpc_name, resources = template.len(), "Built network template");
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> NetworkConfig {
        NetworkConfig::from_settings(&NetworkSettings::default(), "us-east-1")
    }

    fn parse(template: &Template) -> serde_yaml::Value {
        serde_yaml::from_str(template.render().unwrap().body()).unwrap()
    }

    fn depends_on(parsed: &serde_yaml::Value, name: &str) -> Vec<String> {
        parsed["Resources"][name]["DependsOn"]
            .as_sequence()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_vpc_gateway_and_two_subnets_render_five_blocks() {
        let mut template = Template::new();
        let vpc = template
            .add_resource(
                "VPC",
                Vpc {
                    cidr_block: "10.0.0.0/16".into(),
                    enable_dns_support: true,
                    enable_dns_hostnames: true,
                    tags: Tags::named("dev"),
                },
            )
            .unwrap();
        let gateway = template
            .add_resource("InternetGateway", InternetGateway { tags: Tags::new() })
            .unwrap();
        let attachment = template
            .add_resource(
                "VPCGatewayAttachment",
                VpcGatewayAttachment {
                    vpc: (&vpc).into(),
                    internet_gateway: (&gateway).into(),
                },
            )
            .unwrap();
        template.depends_on(&attachment, &vpc).unwrap();
        template.depends_on(&attachment, &gateway).unwrap();
        for (name, cidr) in [("PublicSubnet1", "10.0.1.0/24"), ("PublicSubnet2", "10.0.2.0/24")] {
            template
                .add_resource(
                    name,
                    Subnet {
                        vpc: (&vpc).into(),
                        cidr_block: cidr.into(),
                        availability_zone: None,
                        map_public_ip_on_launch: true,
                        tags: Tags::new(),
                    },
                )
                .unwrap();
        }

        let document = template.render().unwrap();
        assert_eq!(document.resource_count(), 5);

        let parsed: serde_yaml::Value = serde_yaml::from_str(document.body()).unwrap();
        assert_eq!(parsed["Resources"].as_mapping().unwrap().len(), 5);
        assert_eq!(
            depends_on(&parsed, "VPCGatewayAttachment"),
            vec!["VPC".to_string(), "InternetGateway".to_string()]
        );
        assert_eq!(
            parsed["Resources"]["PublicSubnet2"]["Properties"]["CidrBlock"].as_str(),
            Some("10.0.2.0/24")
        );
    }

    #[test]
    fn test_add_subnets_creates_subnet_and_association_pairs() {
        let mut template = Template::new();
        let vpc = template
            .add_resource(
                "VPC",
                Vpc {
                    cidr_block: "10.0.0.0/16".into(),
                    enable_dns_support: true,
                    enable_dns_hostnames: true,
                    tags: Tags::new(),
                },
            )
            .unwrap();
        let table = template
            .add_resource(
                "PublicRouteTable",
                RouteTable {
                    vpc: (&vpc).into(),
                    tags: Tags::new(),
                },
            )
            .unwrap();

        let subnets = add_subnets(
            &mut template,
            &ResourceRef::from(&vpc),
            "dev",
            &config().public_subnets(),
            &table,
        )
        .unwrap();

        assert_eq!(
            subnets.keys().collect::<Vec<_>>(),
            vec!["PublicSvcSubnet1b", "PublicWebSubnet1a"]
        );
        assert_eq!(template.len(), 6);

        let parsed = parse(&template);
        let web = &parsed["Resources"]["PublicWebSubnet1a"]["Properties"];
        assert_eq!(web["AvailabilityZone"].as_str(), Some("us-east-1a"));
        assert_eq!(web["MapPublicIpOnLaunch"].as_bool(), Some(true));
        assert_eq!(web["Tags"][0]["Value"].as_str(), Some("dev-PublicWebSubnet1a"));
        assert_eq!(web["Tags"][1]["Value"].as_str(), Some("public_web"));

        let association = &parsed["Resources"]["PublicRouteTableAssociationWeb1a"]["Properties"];
        assert_eq!(association["SubnetId"]["Ref"].as_str(), Some("PublicWebSubnet1a"));
        assert_eq!(association["RouteTableId"]["Ref"].as_str(), Some("PublicRouteTable"));
    }

    #[test]
    fn test_add_subnets_rejects_duplicate_names() {
        let mut template = Template::new();
        let table = template
            .add_resource(
                "Table",
                RouteTable {
                    vpc: ResourceRef::existing("vpc-1"),
                    tags: Tags::new(),
                },
            )
            .unwrap();
        let configs = vec![config().private_subnets()[0].clone(); 2];

        let err = add_subnets(
            &mut template,
            &ResourceRef::existing("vpc-1"),
            "dev",
            &configs,
            &table,
        )
        .unwrap_err();
        assert_eq!(
            err,
            TemplateError::DuplicateResourceName("PrivateDbSubnet1a".to_string())
        );
    }

    #[test]
    fn test_add_subnets_leaves_no_half_applied_pair() {
        let mut template = Template::new();
        let table = template
            .add_resource(
                "Table",
                RouteTable {
                    vpc: ResourceRef::existing("vpc-1"),
                    tags: Tags::new(),
                },
            )
            .unwrap();
        let configs = [
            SubnetConfig::new("AppSubnet", "10.0.7.0/24", "us-east-1a", "app", "Table"),
            SubnetConfig::new("OddSubnet", "10.0.8.0/24", "us-east-1a", "app", "OddSubnet"),
            SubnetConfig::new("BadSubnet", "10.0.9.0/24", "us-east-1a", "app", "bad-name"),
        ];

        for config in configs {
            let err = add_subnets(
                &mut template,
                &ResourceRef::existing("vpc-1"),
                "dev",
                std::slice::from_ref(&config),
                &table,
            )
            .unwrap_err();
            assert!(matches!(
                err,
                TemplateError::DuplicateResourceName(_) | TemplateError::InvalidLogicalName(_)
            ));
        }
        assert_eq!(template.logical_names().collect::<Vec<_>>(), vec!["Table"]);
    }

    #[test]
    fn test_network_template_contents() {
        let template = build_network_template(&config()).unwrap();
        assert_eq!(template.len(), 21);

        let parsed = parse(&template);
        let resources = &parsed["Resources"];
        assert_eq!(
            resources["VPC"]["Properties"]["CidrBlock"].as_str(),
            Some("10.0.0.0/16")
        );
        assert_eq!(
            resources["PrivateSvcSubnet1b"]["Properties"]["CidrBlock"].as_str(),
            Some("10.0.12.0/24")
        );
        assert_eq!(
            resources["PublicEIPSubnet1b"]["Properties"]["CidrBlock"].as_str(),
            Some("10.0.30.0/24")
        );
        assert_eq!(
            resources["NatGateway"]["Properties"]["AllocationId"]["Fn::GetAtt"][0].as_str(),
            Some("EIPforNatGateway")
        );
        assert_eq!(
            resources["PrivateRoute"]["Properties"]["NatGatewayId"]["Ref"].as_str(),
            Some("NatGateway")
        );
        assert_eq!(
            resources["PrivateHostedZone"]["Properties"]["VPCs"][0]["VPCRegion"]["Ref"].as_str(),
            Some("AWS::Region")
        );
        assert_eq!(
            resources["BaseSecurityGroup"]["Properties"]["Tags"][0]["Value"].as_str(),
            Some("base-sg")
        );
        assert_eq!(
            parsed["Outputs"]["PrivateDbSubnet1aId"]["Value"]["Ref"].as_str(),
            Some("PrivateDbSubnet1a")
        );
    }

    #[test]
    fn test_network_explicit_ordering() {
        let template = build_network_template(&config()).unwrap();
        let attachment = vec!["VPCGatewayAttachment".to_string()];

        assert_eq!(
            template.explicit_dependencies("VPCGatewayAttachment"),
            Some(&["VPC".to_string(), "InternetGateway".to_string()][..])
        );
        for name in ["PublicInternetTrafficRoute", "PrivateRoute", "EIPforNatGateway"] {
            assert_eq!(template.explicit_dependencies(name), Some(&attachment[..]));
        }
        assert_eq!(
            template.explicit_dependencies("PublicEIPSubnet1b"),
            Some(&["VPC".to_string()][..])
        );
    }

    #[test]
    fn test_octet_and_region_flow_into_cidrs_and_zones() {
        let config = NetworkConfig {
            octet: "172.16".into(),
            region: "eu-west-1".into(),
            ..config()
        };
        let subnets = config.private_subnets();
        assert_eq!(subnets[0].cidr_block, "172.16.11.0/24");
        assert_eq!(subnets[1].availability_zone.as_deref(), Some("eu-west-1b"));
        assert_eq!(config.vpc_cidr(), "172.16.0.0/16");
        assert_eq!(
            IngressRule::tcp(22, config.vpc_cidr()).cidr_ip,
            "172.16.0.0/16"
        );
    }
}
