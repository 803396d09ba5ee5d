//! # Infra Recipe
//!
//! Declarative provisioning of a development network and an instance fleet on
//! top of [`stack_framework`].
//!
//! - **[`resources`]**: typed EC2 and Route 53 resource definitions.
//! - **[`network`]**: the VPC stack, with public/private subnets, NAT egress,
//!   a base security group and a private hosted zone.
//! - **[`fleet`]**: the instance stack, placed into the network by tag lookups.
//! - **[`lifecycle`]**: the [`Deployer`](lifecycle::Deployer) context that
//!   ties a locator and a reconciler to one backend.
//! - **[`config`]**: TOML settings with defaults for the `dev` environment.
//!
//! With the `aws` feature (on by default) the [`aws`] module provides the
//! CloudFormation and EC2 backends. Without it only the local orchestrator is
//! available.
//!
//! ## Quick Start
//!
//! ```no_run
//! use infra_recipe::config::AppConfig;
//! use infra_recipe::lifecycle::Deployer;
//!
//! # async fn run() -> Result<(), infra_recipe::error::DeployError> {
//! let deployer = Deployer::local(AppConfig::default());
//! let stacks = deployer.deploy_all().await?;
//! for stack in &stacks {
//!     println!("{}: {}", stack.name, stack.status);
//! }
//! deployer.shutdown().await;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "aws")]
pub mod aws;
pub mod config;
pub mod error;
pub mod fleet;
pub mod lifecycle;
pub mod network;
pub mod resources;
