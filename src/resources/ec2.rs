//! EC2 networking and compute resource kinds.

use stack_framework::{Handle, Properties, Resource, ResourceRef, Tags, Value};

#[derive(Debug, Clone)]
pub struct Vpc {
    pub cidr_block: String,
    pub enable_dns_support: bool,
    pub enable_dns_hostnames: bool,
    pub tags: Tags,
}

impl Resource for Vpc {
    const RESOURCE_TYPE: &'static str = "AWS::EC2::VPC";

    fn properties(&self) -> Properties {
        Properties::new()
            .with("CidrBlock", self.cidr_block.as_str())
            .with("EnableDnsSupport", self.enable_dns_support)
            .with("EnableDnsHostnames", self.enable_dns_hostnames)
            .with_tags("Tags", self.tags.clone())
    }
}

#[derive(Debug, Clone)]
pub struct InternetGateway {
    pub tags: Tags,
}

impl Resource for InternetGateway {
    const RESOURCE_TYPE: &'static str = "AWS::EC2::InternetGateway";

    fn properties(&self) -> Properties {
        Properties::new().with_tags("Tags", self.tags.clone())
    }
}

#[derive(Debug, Clone)]
pub struct VpcGatewayAttachment {
    pub vpc: ResourceRef<Vpc>,
    pub internet_gateway: ResourceRef<InternetGateway>,
}

impl Resource for VpcGatewayAttachment {
    const RESOURCE_TYPE: &'static str = "AWS::EC2::VPCGatewayAttachment";

    fn properties(&self) -> Properties {
        Properties::new()
            .with("VpcId", &self.vpc)
            .with("InternetGatewayId", &self.internet_gateway)
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    pub vpc: ResourceRef<Vpc>,
    pub tags: Tags,
}

impl Resource for RouteTable {
    const RESOURCE_TYPE: &'static str = "AWS::EC2::RouteTable";

    fn properties(&self) -> Properties {
        Properties::new()
            .with("VpcId", &self.vpc)
            .with_tags("Tags", self.tags.clone())
    }
}

/// Where a route sends its traffic.
#[derive(Debug, Clone)]
pub enum RouteTarget {
    InternetGateway(ResourceRef<InternetGateway>),
    NatGateway(ResourceRef<NatGateway>),
}

#[derive(Debug, Clone)]
pub struct Route {
    pub route_table: ResourceRef<RouteTable>,
    pub destination_cidr_block: String,
    pub target: RouteTarget,
}

impl Resource for Route {
    const RESOURCE_TYPE: &'static str = "AWS::EC2::Route";

    fn properties(&self) -> Properties {
        let properties = Properties::new()
            .with("RouteTableId", &self.route_table)
            .with("DestinationCidrBlock", self.destination_cidr_block.as_str());
        match &self.target {
            RouteTarget::InternetGateway(gateway) => properties.with("GatewayId", gateway),
            RouteTarget::NatGateway(nat) => properties.with("NatGatewayId", nat),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Subnet {
    pub vpc: ResourceRef<Vpc>,
    pub cidr_block: String,
    pub availability_zone: Option<String>,
    pub map_public_ip_on_launch: bool,
    pub tags: Tags,
}

impl Resource for Subnet {
    const RESOURCE_TYPE: &'static str = "AWS::EC2::Subnet";

    fn properties(&self) -> Properties {
        Properties::new()
            .with("VpcId", &self.vpc)
            .with("CidrBlock", self.cidr_block.as_str())
            .with_opt("AvailabilityZone", self.availability_zone.as_deref())
            .with("MapPublicIpOnLaunch", self.map_public_ip_on_launch)
            .with_tags("Tags", self.tags.clone())
    }
}

#[derive(Debug, Clone)]
pub struct SubnetRouteTableAssociation {
    pub subnet: ResourceRef<Subnet>,
    pub route_table: ResourceRef<RouteTable>,
}

impl Resource for SubnetRouteTableAssociation {
    const RESOURCE_TYPE: &'static str = "AWS::EC2::SubnetRouteTableAssociation";

    fn properties(&self) -> Properties {
        Properties::new()
            .with("SubnetId", &self.subnet)
            .with("RouteTableId", &self.route_table)
    }
}

/// Elastic IP. `domain` is `vpc` for addresses used by NAT gateways.
#[derive(Debug, Clone)]
pub struct Eip {
    pub domain: String,
    pub tags: Tags,
}

impl Resource for Eip {
    const RESOURCE_TYPE: &'static str = "AWS::EC2::EIP";

    fn properties(&self) -> Properties {
        Properties::new()
            .with("Domain", self.domain.as_str())
            .with_tags("Tags", self.tags.clone())
    }
}

/// NAT gateway bound to an EIP in the same template, so its allocation id
/// is always a `Fn::GetAtt`.
#[derive(Debug, Clone)]
pub struct NatGateway {
    pub eip: Handle<Eip>,
    pub subnet: ResourceRef<Subnet>,
    pub tags: Tags,
}

impl Resource for NatGateway {
    const RESOURCE_TYPE: &'static str = "AWS::EC2::NatGateway";

    fn properties(&self) -> Properties {
        Properties::new()
            .with("AllocationId", self.eip.get_att("AllocationId"))
            .with("SubnetId", &self.subnet)
            .with_tags("Tags", self.tags.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngressRule {
    pub ip_protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    pub cidr_ip: String,
}

impl IngressRule {
    pub fn tcp(port: u16, cidr_ip: impl Into<String>) -> Self {
        Self {
            ip_protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            cidr_ip: cidr_ip.into(),
        }
    }
}

impl From<&IngressRule> for Value {
    fn from(rule: &IngressRule) -> Self {
        Value::map([
            ("IpProtocol", Value::from(rule.ip_protocol.as_str())),
            ("FromPort", Value::from(rule.from_port)),
            ("ToPort", Value::from(rule.to_port)),
            ("CidrIp", Value::from(rule.cidr_ip.as_str())),
        ])
    }
}

#[derive(Debug, Clone)]
pub struct SecurityGroup {
    pub group_description: String,
    pub vpc: ResourceRef<Vpc>,
    pub ingress: Vec<IngressRule>,
    pub tags: Tags,
}

impl Resource for SecurityGroup {
    const RESOURCE_TYPE: &'static str = "AWS::EC2::SecurityGroup";

    fn properties(&self) -> Properties {
        let ingress: Vec<Value> = self.ingress.iter().map(Value::from).collect();
        let properties = Properties::new()
            .with("GroupDescription", self.group_description.as_str())
            .with("VpcId", &self.vpc);
        let properties = if ingress.is_empty() {
            properties
        } else {
            properties.with("SecurityGroupIngress", ingress)
        };
        properties.with_tags("Tags", self.tags.clone())
    }
}

#[derive(Debug, Clone)]
pub struct Instance {
    pub image_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub security_groups: Vec<ResourceRef<SecurityGroup>>,
    pub subnet: ResourceRef<Subnet>,
    pub tags: Tags,
}

impl Resource for Instance {
    const RESOURCE_TYPE: &'static str = "AWS::EC2::Instance";

    fn properties(&self) -> Properties {
        let security_groups: Vec<Value> = self.security_groups.iter().map(Value::from).collect();
        Properties::new()
            .with("ImageId", self.image_id.as_str())
            .with("InstanceType", self.instance_type.as_str())
            .with("KeyName", self.key_name.as_str())
            .with("SecurityGroupIds", security_groups)
            .with("SubnetId", &self.subnet)
            .with_tags("Tags", self.tags.clone())
    }
}
