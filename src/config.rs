//! # Configuration
//!
//! Every setting has a default, so an empty or missing file deploys the `dev`
//! environment. A TOML file overrides any subset:
//!
//! ```toml
//! region = "us-west-2"
//!
//! [network]
//! vpc_name = "staging"
//! octet = "10.20"
//!
//! [fleet]
//! public_nodes = 1
//! ```

use serde::Deserialize;
use stack_framework::{LocalSettings, WaiterConfig};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub region: String,
    pub network: NetworkSettings,
    pub fleet: FleetSettings,
    pub waiter: WaiterSettings,
    pub local: LocalBackendSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            network: NetworkSettings::default(),
            fleet: FleetSettings::default(),
            waiter: WaiterSettings::default(),
            local: LocalBackendSettings::default(),
        }
    }
}

impl AppConfig {
    /// Reads `path`, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            None => Ok(Self::default()),
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&raw)
            }
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.waiter.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSettings {
    pub vpc_name: String,
    /// First two octets of every CIDR block, e.g. `10.0`.
    pub octet: String,
    pub hosted_zone: String,
    pub stack_name: String,
    pub security_group_name: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            vpc_name: "dev".to_string(),
            octet: "10.0".to_string(),
            hosted_zone: "dev.internal".to_string(),
            stack_name: "dev-vpc-stack".to_string(),
            security_group_name: "base-sg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FleetSettings {
    pub stack_name: String,
    pub key_name: String,
    pub instance_type: String,
    pub image_id: String,
    pub public_nodes: usize,
    pub private_nodes: usize,
    /// Subnet logical names from the network stack.
    pub public_subnet: String,
    pub private_subnet: String,
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            stack_name: "dev-ec2-stack".to_string(),
            key_name: "infracidlabs-key".to_string(),
            instance_type: "t2.small".to_string(),
            image_id: "ami-0866a3c8686eaeeba".to_string(),
            public_nodes: 2,
            private_nodes: 3,
            public_subnet: "PublicWebSubnet1a".to_string(),
            private_subnet: "PrivateDbSubnet1a".to_string(),
        }
    }
}

/// Stack polling schedule, in milliseconds.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WaiterSettings {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub timeout_ms: u64,
}

impl Default for WaiterSettings {
    fn default() -> Self {
        let waiter = WaiterConfig::default();
        Self {
            initial_delay_ms: waiter.initial_delay.as_millis() as u64,
            max_delay_ms: waiter.max_delay.as_millis() as u64,
            multiplier: waiter.multiplier,
            timeout_ms: waiter.timeout.as_millis() as u64,
        }
    }
}

impl WaiterSettings {
    /// Rejects schedules that would busy-poll or never back off.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "waiter.multiplier must be a finite number >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.initial_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "waiter.initial_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "waiter.max_delay_ms ({}) is below waiter.initial_delay_ms ({})",
                self.max_delay_ms, self.initial_delay_ms
            )));
        }
        Ok(())
    }

    pub fn to_waiter(&self) -> WaiterConfig {
        WaiterConfig {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// Behaviour of the in-process backend used by `--local`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LocalBackendSettings {
    pub settle_polls: u32,
    pub failing_stacks: Vec<String>,
    pub instance_types: Vec<String>,
    pub page_size: usize,
}

impl Default for LocalBackendSettings {
    fn default() -> Self {
        let settings = LocalSettings::default();
        Self {
            settle_polls: settings.settle_polls,
            failing_stacks: Vec::new(),
            instance_types: settings.instance_types,
            page_size: settings.page_size,
        }
    }
}

impl LocalBackendSettings {
    pub fn to_settings(&self) -> LocalSettings {
        LocalSettings {
            settle_polls: self.settle_polls,
            failing_stacks: self.failing_stacks.iter().cloned().collect::<HashSet<_>>(),
            instance_types: self.instance_types.clone(),
            page_size: self.page_size,
        }
    }
}
