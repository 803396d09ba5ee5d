//! # Stack Framework
//!
//! Building blocks for declarative infrastructure: describe resources as typed
//! Rust values, render them into one orchestrator document, and drive a named
//! stack until the orchestrator reports that it matches.
//!
//! ## Architecture Overview
//!
//! The crate is split into three layers:
//!
//! 1. **Template Layer** ([`Template`], [`Resource`], [`Handle`]) - typed resource
//!    definitions, cross-references and explicit ordering edges, rendered into a
//!    [`Document`].
//! 2. **Remote Layer** ([`StackApi`], [`InventoryApi`]) - the two async seams to a
//!    provider. Production adapters, the [`LocalOrchestrator`] and the [`mock`]
//!    doubles all sit behind them.
//! 3. **Control Layer** ([`ResourceLocator`], [`Reconciler`]) - tag lookups for
//!    prerequisites, and the create-or-update-then-wait loop.
//!
//! Nothing here holds process-wide state. A deployment builds a locator and a
//! reconciler over whichever backend it chose and passes them where needed.
//!
//! ## Quick Start
//!
//! ```rust
//! use stack_framework::{
//!     LocalOrchestrator, LocalSettings, Properties, Reconciler, Resource, StackStatus, Tags,
//!     Template, WaiterConfig,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct Vpc { cidr: String }
//!
//! impl Resource for Vpc {
//!     const RESOURCE_TYPE: &'static str = "AWS::EC2::VPC";
//!     fn properties(&self) -> Properties {
//!         Properties::new()
//!             .with("CidrBlock", self.cidr.as_str())
//!             .with_tags("Tags", Tags::named("dev"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let (orchestrator, client) = LocalOrchestrator::new(10, LocalSettings::default());
//!     tokio::spawn(orchestrator.run());
//!
//!     let mut template = Template::new();
//!     template.add_resource("VPC", Vpc { cidr: "10.0.0.0/16".into() }).unwrap();
//!     let document = template.render().unwrap();
//!
//!     let waiter = WaiterConfig::default().with_initial_delay(Duration::from_millis(1));
//!     let reconciler = Reconciler::new(Arc::new(client)).with_waiter(waiter);
//!     let record = reconciler.reconcile("dev-vpc-stack", &document).await.unwrap();
//!     assert_eq!(record.status, StackStatus::CreateComplete);
//! }
//! ```
//!
//! ## Testing
//!
//! Use [`mock::MockStackApi`] and [`mock::MockInventory`] to script exact status
//! sequences and failures. Use the [`LocalOrchestrator`] when the test should
//! exercise a realistic create, update and delete flow end to end.

pub mod actor;
pub mod client;
pub mod error;
pub mod locator;
pub mod message;
pub mod mock;
pub mod reconciler;
pub mod remote;
pub mod resource;
pub mod status;
pub mod template;
pub mod tracing;
pub mod value;

// Re-export commonly used types
pub use actor::{LocalOrchestrator, LocalSettings};
pub use client::OrchestratorClient;
pub use error::{NotFound, ReconcileError, RemoteError, TemplateError};
pub use locator::{Lookup, ResourceLocator};
pub use message::{OrchestratorRequest, Response};
pub use reconciler::{Reconciler, WaiterConfig};
pub use remote::{InstanceTypePage, InventoryApi, InventoryKind, StackApi, UpdateOutcome};
pub use resource::{Handle, Resource, ResourceRef};
pub use status::{StackRecord, StackStatus};
pub use template::{Document, Output, Relation, Template};
pub use value::{Properties, PseudoParameter, Tags, Value};
