//! # Lifecycle
//!
//! The [`Deployer`] context and the deployment flow it drives:
//!
//! 1. **Network** - build the network template and reconcile the VPC stack.
//! 2. **Fleet** - check the instance type, locate the subnets and security
//!    group by tag, build the fleet template and reconcile the EC2 stack.
//! 3. **Teardown** - delete a stack and wait until it is gone.
//!
//! Every step logs through `tracing`; run with `RUST_LOG=debug` to see the
//! rendered templates.

pub mod deployer;

pub use deployer::*;
