//! # Instance Fleet Template
//!
//! Places `public_nodes` instances in one public subnet and `private_nodes` in
//! one private subnet. The subnets and the security group live in the network
//! stack, so the template refers to them by physical id, resolved beforehand
//! by the locator.

use crate::config::{FleetSettings, NetworkSettings};
use crate::resources::{Instance, SecurityGroup, Subnet};
use stack_framework::{Output, ResourceRef, Tags, Template, TemplateError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct FleetConfig {
    pub vpc_name: String,
    pub image_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub public_nodes: usize,
    pub private_nodes: usize,
}

impl FleetConfig {
    pub fn from_settings(network: &NetworkSettings, fleet: &FleetSettings) -> Self {
        Self {
            vpc_name: network.vpc_name.clone(),
            image_id: fleet.image_id.clone(),
            instance_type: fleet.instance_type.clone(),
            key_name: fleet.key_name.clone(),
            public_nodes: fleet.public_nodes,
            private_nodes: fleet.private_nodes,
        }
    }
}

/// Physical ids the fleet is placed into.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetPlacement {
    pub public_subnet: String,
    pub private_subnet: String,
    pub security_group: String,
}

pub fn build_fleet_template(
    config: &FleetConfig,
    placement: &FleetPlacement,
) -> Result<Template, TemplateError> {
    let mut template = Template::new().with_description(format!(
        "{} public and {} private instances in {}",
        config.public_nodes, config.private_nodes, config.vpc_name
    ));

    let tiers = [
        ("pubsvr", "pub-svr", config.public_nodes, &placement.public_subnet),
        ("privsvr", "priv-svr", config.private_nodes, &placement.private_subnet),
    ];
    for (logical_prefix, name_prefix, count, subnet_id) in tiers {
        for i in 0..count {
            let logical_name = format!("{logical_prefix}0{i}");
            let instance = template.add_resource(
                logical_name.as_str(),
                Instance {
                    image_id: config.image_id.clone(),
                    instance_type: config.instance_type.clone(),
                    key_name: config.key_name.clone(),
                    security_groups: vec![ResourceRef::<SecurityGroup>::existing(
                        placement.security_group.as_str(),
                    )],
                    subnet: ResourceRef::<Subnet>::existing(subnet_id.as_str()),
                    tags: Tags::named(format!("{name_prefix}0{i}"))
                        .with("Environment", config.vpc_name.as_str()),
                },
            )?;
            template.add_output(format!("{logical_name}Id"), Output::new(&instance))?;
        }
    }

    debug!(instances = template.len(), "Built fleet template");
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> FleetConfig {
        FleetConfig::from_settings(&NetworkSettings::default(), &FleetSettings::default())
    }

    fn placement() -> FleetPlacement {
        FleetPlacement {
            public_subnet: "subnet-pub".into(),
            private_subnet: "subnet-priv".into(),
            security_group: "sg-base".into(),
        }
    }

    #[test]
    fn test_fleet_names_and_placement() {
        let template = build_fleet_template(&config(), &placement()).unwrap();
        assert_eq!(
            template.logical_names().collect::<Vec<_>>(),
            vec!["pubsvr00", "pubsvr01", "privsvr00", "privsvr01", "privsvr02"]
        );

        let parsed: serde_yaml::Value =
            serde_yaml::from_str(template.render().unwrap().body()).unwrap();
        let public = &parsed["Resources"]["pubsvr01"]["Properties"];
        assert_eq!(public["SubnetId"].as_str(), Some("subnet-pub"));
        assert_eq!(public["SecurityGroupIds"][0].as_str(), Some("sg-base"));
        assert_eq!(public["InstanceType"].as_str(), Some("t2.small"));
        assert_eq!(public["KeyName"].as_str(), Some("infracidlabs-key"));
        assert_eq!(public["Tags"][0]["Value"].as_str(), Some("pub-svr01"));
        assert_eq!(public["Tags"][1]["Key"].as_str(), Some("Environment"));
        assert_eq!(public["Tags"][1]["Value"].as_str(), Some("dev"));

        let private = &parsed["Resources"]["privsvr02"]["Properties"];
        assert_eq!(private["SubnetId"].as_str(), Some("subnet-priv"));
        assert_eq!(private["Tags"][0]["Value"].as_str(), Some("priv-svr02"));
    }

    #[test]
    fn test_empty_tier_is_skipped() {
        let config = FleetConfig {
            public_nodes: 0,
            private_nodes: 1,
            ..config()
        };
        let template = build_fleet_template(&config, &placement()).unwrap();
        assert_eq!(template.logical_names().collect::<Vec<_>>(), vec!["privsvr00"]);
    }
}
