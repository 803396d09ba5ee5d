//! # Local Orchestrator
//!
//! An in-process stand-in for the stack orchestration and inventory services,
//! used for dry runs and integration tests.
//!
//! ## LocalOrchestrator
//!
//! `LocalOrchestrator` is the *server* half: it owns every simulated stack and
//! inventory item and processes [`OrchestratorRequest`]s one at a time in its
//! own Tokio task, so its state needs no locking. Callers talk to it through
//! the cloneable [`OrchestratorClient`], which implements both
//! [`StackApi`](crate::remote::StackApi) and [`InventoryApi`](crate::remote::InventoryApi).
//!
//! ```rust
//! use stack_framework::{LocalOrchestrator, LocalSettings, StackApi};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (orchestrator, client) = LocalOrchestrator::new(10, LocalSettings::default());
//!     tokio::spawn(orchestrator.run());
//!
//!     client.create_stack("dev-vpc", "Resources: {}").await.unwrap();
//!     let record = client.describe_stack("dev-vpc").await.unwrap();
//!     assert!(record.is_some());
//! }
//! ```
//!
//! ## Simulated behaviour
//!
//! * **Create / Update**: the stack enters `*_IN_PROGRESS` and settles after
//!   `settle_polls` further describes. Stacks listed in `failing_stacks` settle to
//!   `CREATE_FAILED` or `UPDATE_ROLLBACK_COMPLETE` instead.
//! * **Settling successfully** assigns a physical id to every resource and
//!   registers each `Name`-tagged VPC, subnet and security group in the inventory.
//! * **Delete** settles the same way, then the stack and its inventory vanish.
//! * **Instance types** come from settings and are paged by `page_size`.

use crate::client::OrchestratorClient;
use crate::error::RemoteError;
use crate::message::OrchestratorRequest;
use crate::remote::{InstanceTypePage, InventoryKind, UpdateOutcome};
use crate::status::{StackRecord, StackStatus};
use serde_yaml::Value as Yaml;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Tunables for the simulation.
#[derive(Debug, Clone)]
pub struct LocalSettings {
    /// Describes answered with `*_IN_PROGRESS` before a mutation settles.
    pub settle_polls: u32,
    /// Stack names whose create or update will fail.
    pub failing_stacks: HashSet<String>,
    /// Instance types served by the listing. Entries may be `|`-joined.
    pub instance_types: Vec<String>,
    pub page_size: usize,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            settle_polls: 1,
            failing_stacks: HashSet::new(),
            instance_types: [
                "t2.micro", "t2.small", "t2.medium", "t3.micro", "t3.small", "t3.medium",
                "m5.large", "m5.xlarge", "c5.large", "r5.large",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            page_size: 4,
        }
    }
}

impl LocalSettings {
    pub fn with_settle_polls(mut self, polls: u32) -> Self {
        self.settle_polls = polls;
        self
    }

    pub fn with_failing_stack(mut self, stack_name: impl Into<String>) -> Self {
        self.failing_stacks.insert(stack_name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Pending {
    Create,
    Update,
    Delete,
}

#[derive(Debug)]
struct StackEntry {
    status: StackStatus,
    reason: Option<String>,
    body: String,
    /// Body to restore if an in-flight update rolls back.
    previous_body: Option<String>,
    pending: Option<Pending>,
    polls_left: u32,
    /// Logical name to physical id, filled in when a mutation settles.
    physical_ids: BTreeMap<String, String>,
    outputs: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct InventoryItem {
    stack_name: String,
    kind: InventoryKind,
    tag: String,
    id: String,
}

pub struct LocalOrchestrator {
    receiver: mpsc::Receiver<OrchestratorRequest>,
    settings: LocalSettings,
    stacks: HashMap<String, StackEntry>,
    inventory: Vec<InventoryItem>,
    next_id: u64,
}

impl LocalOrchestrator {
    /// Creates the orchestrator and its client. The orchestrator does nothing
    /// until [`run`](Self::run) is spawned.
    pub fn new(buffer_size: usize, settings: LocalSettings) -> (Self, OrchestratorClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let orchestrator = Self {
            receiver,
            settings,
            stacks: HashMap::new(),
            inventory: Vec::new(),
            next_id: 1,
        };
        (orchestrator, OrchestratorClient::new(sender))
    }

    /// Processes requests until every client has been dropped.
    pub async fn run(mut self) {
        info!("Local orchestrator started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                OrchestratorRequest::Describe {
                    stack_name,
                    respond_to,
                } => {
                    let record = self.describe(&stack_name);
                    let status = record.as_ref().map(|r| r.status.clone());
                    debug!(stack_name, ?status, "Describe");
                    let _ = respond_to.send(Ok(record));
                }
                OrchestratorRequest::Create {
                    stack_name,
                    template_body,
                    respond_to,
                } => {
                    let result = self.create(&stack_name, template_body);
                    log_mutation("Create", &stack_name, &result);
                    let _ = respond_to.send(result);
                }
                OrchestratorRequest::Update {
                    stack_name,
                    template_body,
                    respond_to,
                } => {
                    let result = self.update(&stack_name, template_body);
                    log_mutation("Update", &stack_name, &result);
                    let _ = respond_to.send(result);
                }
                OrchestratorRequest::Delete {
                    stack_name,
                    respond_to,
                } => {
                    let result = self.delete(&stack_name);
                    log_mutation("Delete", &stack_name, &result);
                    let _ = respond_to.send(result);
                }
                OrchestratorRequest::FindByTag {
                    kind,
                    tag_value,
                    respond_to,
                } => {
                    let ids: Vec<String> = self
                        .inventory
                        .iter()
                        .filter(|item| item.kind == kind && item.tag == tag_value)
                        .map(|item| item.id.clone())
                        .collect();
                    debug!(%kind, tag = tag_value, matches = ids.len(), "FindByTag");
                    let _ = respond_to.send(Ok(ids));
                }
                OrchestratorRequest::ListInstanceTypes {
                    next_token,
                    respond_to,
                } => {
                    let _ = respond_to.send(self.instance_type_page(next_token));
                }
            }
        }

        info!(
            stacks = self.stacks.len(),
            inventory = self.inventory.len(),
            "Shutdown"
        );
    }

    fn describe(&mut self, stack_name: &str) -> Option<StackRecord> {
        let entry = self.stacks.get_mut(stack_name)?;
        if let Some(pending) = entry.pending {
            if entry.polls_left > 0 {
                entry.polls_left -= 1;
            } else {
                self.settle(stack_name, pending);
            }
        }
        let entry = self.stacks.get(stack_name)?;
        let mut record = StackRecord::new(stack_name, entry.status.clone()).with_body(&entry.body);
        record.status_reason = entry.reason.clone();
        record.outputs = entry.outputs.clone();
        Some(record)
    }

    fn create(&mut self, stack_name: &str, body: String) -> Result<(), RemoteError> {
        if self.stacks.contains_key(stack_name) {
            return Err(RemoteError::call_failed(
                "CreateStack",
                format!("Stack [{stack_name}] already exists"),
            ));
        }
        let entry = StackEntry {
            status: StackStatus::CreateInProgress,
            reason: None,
            body,
            previous_body: None,
            pending: Some(Pending::Create),
            polls_left: self.settings.settle_polls,
            physical_ids: BTreeMap::new(),
            outputs: Vec::new(),
        };
        self.stacks.insert(stack_name.to_string(), entry);
        Ok(())
    }

    fn update(&mut self, stack_name: &str, body: String) -> Result<UpdateOutcome, RemoteError> {
        let settle_polls = self.settings.settle_polls;
        let entry = self.idle_entry("UpdateStack", stack_name)?;
        if !entry.status.accepts_update() {
            return Err(RemoteError::call_failed(
                "UpdateStack",
                format!(
                    "Stack:{stack_name} is in {} state and can not be updated.",
                    entry.status
                ),
            ));
        }
        if entry.body == body {
            return Ok(UpdateOutcome::NoChanges);
        }
        entry.previous_body = Some(std::mem::replace(&mut entry.body, body));
        entry.status = StackStatus::UpdateInProgress;
        entry.reason = None;
        entry.pending = Some(Pending::Update);
        entry.polls_left = settle_polls;
        Ok(UpdateOutcome::Started)
    }

    fn delete(&mut self, stack_name: &str) -> Result<(), RemoteError> {
        let settle_polls = self.settings.settle_polls;
        let entry = self.idle_entry("DeleteStack", stack_name)?;
        entry.status = StackStatus::DeleteInProgress;
        entry.reason = None;
        entry.pending = Some(Pending::Delete);
        entry.polls_left = settle_polls;
        Ok(())
    }

    /// The entry for a stack that exists and has no mutation in flight.
    fn idle_entry(
        &mut self,
        operation: &str,
        stack_name: &str,
    ) -> Result<&mut StackEntry, RemoteError> {
        match self.stacks.get_mut(stack_name) {
            None => Err(RemoteError::call_failed(
                operation,
                format!("Stack with id {stack_name} does not exist"),
            )),
            Some(entry) if entry.pending.is_some() => Err(RemoteError::call_failed(
                operation,
                format!(
                    "Stack:{stack_name} is in {} state and can not be updated.",
                    entry.status
                ),
            )),
            Some(entry) => Ok(entry),
        }
    }

    fn settle(&mut self, stack_name: &str, pending: Pending) {
        let failing = self.settings.failing_stacks.contains(stack_name);
        match (pending, failing) {
            (Pending::Delete, _) => {
                self.stacks.remove(stack_name);
                self.inventory.retain(|item| item.stack_name != stack_name);
                info!(stack_name, "Stack deleted");
            }
            (Pending::Create, true) => {
                if let Some(entry) = self.stacks.get_mut(stack_name) {
                    entry.pending = None;
                    entry.status = StackStatus::CreateFailed;
                    entry.reason = Some("Simulated resource creation failure".to_string());
                }
                warn!(stack_name, "Create failed");
            }
            (Pending::Update, true) => {
                if let Some(entry) = self.stacks.get_mut(stack_name) {
                    entry.pending = None;
                    entry.status = StackStatus::UpdateRollbackComplete;
                    entry.reason = Some("Simulated resource update failure".to_string());
                    if let Some(previous) = entry.previous_body.take() {
                        entry.body = previous;
                    }
                }
                warn!(stack_name, "Update rolled back");
            }
            (Pending::Create | Pending::Update, false) => {
                let status = if pending == Pending::Create {
                    StackStatus::CreateComplete
                } else {
                    StackStatus::UpdateComplete
                };
                self.materialize(stack_name);
                if let Some(entry) = self.stacks.get_mut(stack_name) {
                    entry.pending = None;
                    entry.previous_body = None;
                    entry.status = status.clone();
                }
                info!(stack_name, %status, "Stack settled");
            }
        }
    }

    /// Assigns physical ids, resolves outputs and refreshes the inventory for a
    /// stack's current body. Resources kept across an update keep their ids.
    fn materialize(&mut self, stack_name: &str) {
        let Some(entry) = self.stacks.get(stack_name) else {
            return;
        };
        let document: Yaml = match serde_yaml::from_str(&entry.body) {
            Ok(document) => document,
            Err(e) => {
                warn!(stack_name, error = %e, "Unparseable template body, nothing registered");
                return;
            }
        };
        let mut physical_ids = BTreeMap::new();
        let mut registered = Vec::new();

        if let Some(resources) = document.get("Resources").and_then(Yaml::as_mapping) {
            for (logical, definition) in resources {
                let Some(logical) = logical.as_str() else {
                    continue;
                };
                let resource_type = definition
                    .get("Type")
                    .and_then(Yaml::as_str)
                    .unwrap_or_default();
                let id = match entry.physical_ids.get(logical) {
                    Some(id) => id.clone(),
                    None => {
                        let id = physical_id(resource_type, self.next_id);
                        self.next_id += 1;
                        id
                    }
                };
                if let Some(kind) = InventoryKind::from_resource_type(resource_type) {
                    if let Some(tag) = name_tag(definition) {
                        registered.push(InventoryItem {
                            stack_name: stack_name.to_string(),
                            kind,
                            tag: tag.to_string(),
                            id: id.clone(),
                        });
                    }
                }
                physical_ids.insert(logical.to_string(), id);
            }
        }

        let outputs = document
            .get("Outputs")
            .and_then(Yaml::as_mapping)
            .map(|outputs| {
                outputs
                    .iter()
                    .filter_map(|(name, output)| {
                        let name = name.as_str()?;
                        let value = resolve_output(output.get("Value")?, &physical_ids)?;
                        Some((name.to_string(), value))
                    })
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            stack_name,
            resources = physical_ids.len(),
            inventory = registered.len(),
            "Materialized"
        );
        self.inventory.retain(|item| item.stack_name != stack_name);
        self.inventory.extend(registered);
        if let Some(entry) = self.stacks.get_mut(stack_name) {
            entry.physical_ids = physical_ids;
            entry.outputs = outputs;
        }
    }

    fn instance_type_page(
        &self,
        next_token: Option<String>,
    ) -> Result<InstanceTypePage, RemoteError> {
        let start = match next_token {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| {
                RemoteError::call_failed(
                    "DescribeInstanceTypeOfferings",
                    format!("Invalid NextToken {token:?}"),
                )
            })?,
        };
        let all = &self.settings.instance_types;
        let end = (start + self.settings.page_size.max(1)).min(all.len());
        let instance_types = all.get(start..end).map(<[String]>::to_vec).unwrap_or_default();
        let next_token = (end < all.len()).then(|| end.to_string());
        debug!(start, returned = instance_types.len(), "ListInstanceTypes");
        Ok(InstanceTypePage {
            instance_types,
            next_token,
        })
    }
}

fn log_mutation<T>(operation: &str, stack_name: &str, result: &Result<T, RemoteError>) {
    match result {
        Ok(_) => info!(operation, stack_name, "Accepted"),
        Err(e) => warn!(operation, stack_name, error = %e, "Rejected"),
    }
}

/// Provider-shaped id: `vpc-…` for VPCs, otherwise the lowercased type suffix.
fn physical_id(resource_type: &str, sequence: u64) -> String {
    let prefix = match InventoryKind::from_resource_type(resource_type) {
        Some(kind) => kind.id_prefix().to_string(),
        None => resource_type
            .rsplit("::")
            .next()
            .unwrap_or("resource")
            .to_ascii_lowercase(),
    };
    format!("{prefix}-{sequence:017x}")
}

/// The literal value of a definition's `Name` tag, if it has one.
fn name_tag(definition: &Yaml) -> Option<&str> {
    definition
        .get("Properties")?
        .get("Tags")?
        .as_sequence()?
        .iter()
        .find(|tag| tag.get("Key").and_then(Yaml::as_str) == Some("Name"))?
        .get("Value")?
        .as_str()
}

/// Literal strings pass through; `Ref` to a known resource becomes its id.
fn resolve_output(value: &Yaml, physical_ids: &BTreeMap<String, String>) -> Option<String> {
    if let Some(literal) = value.as_str() {
        return Some(literal.to_string());
    }
    let target = value.get("Ref")?.as_str()?;
    physical_ids.get(target).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{InventoryApi, StackApi};

    const NETWORK: &str = r#"
AWSTemplateFormatVersion: "2010-09-09"
Resources:
  VPC:
    Type: AWS::EC2::VPC
    Properties:
      CidrBlock: 10.0.0.0/16
      Tags:
        - Key: Name
          Value: dev
  PublicSubnet:
    Type: AWS::EC2::Subnet
    Properties:
      VpcId:
        Ref: VPC
      Tags:
        - Key: Name
          Value: dev-PublicSubnet
Outputs:
  VpcId:
    Value:
      Ref: VPC
"#;

    fn spawn(settings: LocalSettings) -> OrchestratorClient {
        let (orchestrator, client) = LocalOrchestrator::new(16, settings);
        tokio::spawn(orchestrator.run());
        client
    }

    async fn status(client: &OrchestratorClient, stack: &str) -> Option<StackStatus> {
        client
            .describe_stack(stack)
            .await
            .unwrap()
            .map(|record| record.status)
    }

    #[tokio::test]
    async fn test_create_settles_after_configured_polls() {
        let client = spawn(LocalSettings::default().with_settle_polls(2));
        assert_eq!(status(&client, "net").await, None);

        client.create_stack("net", NETWORK).await.unwrap();
        assert_eq!(status(&client, "net").await, Some(StackStatus::CreateInProgress));
        assert_eq!(status(&client, "net").await, Some(StackStatus::CreateInProgress));
        assert_eq!(status(&client, "net").await, Some(StackStatus::CreateComplete));
    }

    #[tokio::test]
    async fn test_settled_stack_registers_tagged_inventory() {
        let client = spawn(LocalSettings::default().with_settle_polls(0));
        client.create_stack("net", NETWORK).await.unwrap();
        let record = client.describe_stack("net").await.unwrap().unwrap();

        let vpcs = client.find_ids_by_tag(InventoryKind::Vpc, "dev").await.unwrap();
        assert_eq!(vpcs.len(), 1);
        assert!(vpcs[0].starts_with("vpc-"));
        assert_eq!(record.output("VpcId"), Some(vpcs[0].as_str()));

        let subnets = client
            .find_ids_by_tag(InventoryKind::Subnet, "dev-PublicSubnet")
            .await
            .unwrap();
        assert_eq!(subnets.len(), 1);
        assert!(subnets[0].starts_with("subnet-"));
    }

    #[tokio::test]
    async fn test_identical_update_reports_no_changes() {
        let client = spawn(LocalSettings::default().with_settle_polls(0));
        client.create_stack("net", NETWORK).await.unwrap();
        status(&client, "net").await;

        let outcome = client.update_stack("net", NETWORK).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::NoChanges);
    }

    #[tokio::test]
    async fn test_update_keeps_physical_ids() {
        let client = spawn(LocalSettings::default().with_settle_polls(0));
        client.create_stack("net", NETWORK).await.unwrap();
        status(&client, "net").await;
        let before = client.find_ids_by_tag(InventoryKind::Vpc, "dev").await.unwrap();

        let changed = NETWORK.replace("10.0.0.0/16", "10.1.0.0/16");
        let outcome = client.update_stack("net", &changed).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Started);
        assert_eq!(status(&client, "net").await, Some(StackStatus::UpdateComplete));

        let after = client.find_ids_by_tag(InventoryKind::Vpc, "dev").await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_failing_stack_settles_to_create_failed() {
        let client = spawn(
            LocalSettings::default()
                .with_settle_polls(0)
                .with_failing_stack("net"),
        );
        client.create_stack("net", NETWORK).await.unwrap();

        let record = client.describe_stack("net").await.unwrap().unwrap();
        assert_eq!(record.status, StackStatus::CreateFailed);
        assert!(record.status_reason.is_some());
        let vpcs = client.find_ids_by_tag(InventoryKind::Vpc, "dev").await.unwrap();
        assert!(vpcs.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_mutations_are_remote_errors() {
        let client = spawn(LocalSettings::default().with_settle_polls(3));

        assert!(client.update_stack("net", NETWORK).await.is_err());
        assert!(client.delete_stack("net").await.is_err());

        client.create_stack("net", NETWORK).await.unwrap();
        assert!(client.create_stack("net", NETWORK).await.is_err());
        // Still in progress.
        assert!(client.delete_stack("net").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_removes_stack_and_inventory() {
        let client = spawn(LocalSettings::default().with_settle_polls(0));
        client.create_stack("net", NETWORK).await.unwrap();
        status(&client, "net").await;

        client.delete_stack("net").await.unwrap();
        assert_eq!(status(&client, "net").await, None);
        let vpcs = client.find_ids_by_tag(InventoryKind::Vpc, "dev").await.unwrap();
        assert!(vpcs.is_empty());
    }

    #[tokio::test]
    async fn test_instance_types_are_paged() {
        let settings = LocalSettings {
            instance_types: vec!["t2.micro".into(), "t2.small|t3.small".into(), "m5.large".into()],
            page_size: 2,
            ..LocalSettings::default()
        };
        let client = spawn(settings);

        let first = client.list_instance_types(None).await.unwrap();
        assert_eq!(first.instance_types.len(), 2);
        let token = first.next_token.expect("second page");

        let second = client.list_instance_types(Some(token)).await.unwrap();
        assert_eq!(second.instance_types, vec!["m5.large".to_string()]);
        assert_eq!(second.next_token, None);

        let err = client
            .list_instance_types(Some("bogus".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::CallFailed { .. }));
    }
}
