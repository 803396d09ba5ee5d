//! # Mocks & Testing Guide
//!
//! [`MockStackApi`] and [`MockInventory`] implement the remote traits entirely
//! in memory. Queue expectations in the order the code under test will make
//! its calls, hand out [`api()`](MockStackApi::api), then call `verify()`.
//! A call that does not match the next expectation panics with both sides.
//!
//! ## When to use Mocks vs the Local Orchestrator
//!
//! | Feature | Mocks | LocalOrchestrator |
//! |---------|-------|-------------------|
//! | **Speed** | Instant | Fast (spawns one task) |
//! | **Statuses** | Any sequence you script | Realistic create/update/delete transitions |
//! | **Use Case** | Reconciler and locator edge cases | End-to-end deployment flows |
//! | **Error Injection** | Easy (`return_err`) | Only via `failing_stacks` |
//!
//! ```rust
//! use stack_framework::mock::MockStackApi;
//! use stack_framework::{Reconciler, StackStatus, Template, WaiterConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut mock = MockStackApi::new();
//!     mock.expect_describe("dev-vpc").return_not_found();
//!     mock.expect_create("dev-vpc").return_ok();
//!     mock.expect_describe("dev-vpc").return_status(StackStatus::CreateComplete);
//!
//!     let waiter = WaiterConfig::default().with_initial_delay(Duration::from_millis(1));
//!     let reconciler = Reconciler::new(mock.api()).with_waiter(waiter);
//!     let document = Template::new().render().unwrap();
//!
//!     let record = reconciler.reconcile("dev-vpc", &document).await.unwrap();
//!     assert_eq!(record.status, StackStatus::CreateComplete);
//!     mock.verify();
//! }
//! ```
//!
//! ## Channel Utilities
//!
//! To test code that talks to the orchestrator through an
//! [`OrchestratorClient`], use [`create_mock_client`] and answer requests on
//! the receiver with the `expect_*` helpers.

use crate::client::OrchestratorClient;
use crate::error::RemoteError;
use crate::message::{OrchestratorRequest, Response};
use crate::remote::{InstanceTypePage, InventoryApi, InventoryKind, StackApi, UpdateOutcome};
use crate::status::{StackRecord, StackStatus};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// =============================================================================
// STACK API MOCK
// =============================================================================

/// A call observed by [`MockStackApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackCall {
    Describe(String),
    Create(String),
    Update(String),
    Delete(String),
}

#[derive(Debug)]
enum StackExpectation {
    Describe {
        stack_name: String,
        response: Result<Option<StackRecord>, RemoteError>,
    },
    Create {
        stack_name: String,
        response: Result<(), RemoteError>,
    },
    Update {
        stack_name: String,
        response: Result<UpdateOutcome, RemoteError>,
    },
    Delete {
        stack_name: String,
        response: Result<(), RemoteError>,
    },
}

type StackQueue = Arc<Mutex<VecDeque<StackExpectation>>>;

/// Scripted [`StackApi`].
#[derive(Clone, Default)]
pub struct MockStackApi {
    expectations: StackQueue,
    calls: Arc<Mutex<Vec<StackCall>>>,
}

impl MockStackApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api(&self) -> Arc<dyn StackApi> {
        Arc::new(self.clone())
    }

    pub fn expect_describe(&mut self, stack_name: &str) -> DescribeExpectationBuilder {
        DescribeExpectationBuilder {
            stack_name: stack_name.to_string(),
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_create(&mut self, stack_name: &str) -> MutationExpectationBuilder {
        MutationExpectationBuilder {
            stack_name: stack_name.to_string(),
            delete: false,
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_update(&mut self, stack_name: &str) -> UpdateExpectationBuilder {
        UpdateExpectationBuilder {
            stack_name: stack_name.to_string(),
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_delete(&mut self, stack_name: &str) -> MutationExpectationBuilder {
        MutationExpectationBuilder {
            stack_name: stack_name.to_string(),
            delete: true,
            expectations: self.expectations.clone(),
        }
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<StackCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of create and update submissions received.
    pub fn mutation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, StackCall::Create(_) | StackCall::Update(_)))
            .count()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let exps = self.expectations.lock().unwrap();
        if !exps.is_empty() {
            panic!(
                "Not all expectations were met. {} remaining, next: {:?}",
                exps.len(),
                exps.front()
            );
        }
    }

    fn next(&self, call: StackCall) -> StackExpectation {
        self.calls.lock().unwrap().push(call.clone());
        let expectation = self.expectations.lock().unwrap().pop_front();
        match expectation {
            Some(expectation) => expectation,
            None => panic!("Unexpected call {call:?}: no expectations left"),
        }
    }
}

#[async_trait]
impl StackApi for MockStackApi {
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackRecord>, RemoteError> {
        match self.next(StackCall::Describe(stack_name.to_string())) {
            StackExpectation::Describe {
                stack_name: expected,
                response,
            } if expected == stack_name => response,
            other => panic!("Expected {other:?}, got describe_stack({stack_name})"),
        }
    }

    async fn create_stack(
        &self,
        stack_name: &str,
        _template_body: &str,
    ) -> Result<(), RemoteError> {
        match self.next(StackCall::Create(stack_name.to_string())) {
            StackExpectation::Create {
                stack_name: expected,
                response,
            } if expected == stack_name => response,
            other => panic!("Expected {other:?}, got create_stack({stack_name})"),
        }
    }

    async fn update_stack(
        &self,
        stack_name: &str,
        _template_body: &str,
    ) -> Result<UpdateOutcome, RemoteError> {
        match self.next(StackCall::Update(stack_name.to_string())) {
            StackExpectation::Update {
                stack_name: expected,
                response,
            } if expected == stack_name => response,
            other => panic!("Expected {other:?}, got update_stack({stack_name})"),
        }
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<(), RemoteError> {
        match self.next(StackCall::Delete(stack_name.to_string())) {
            StackExpectation::Delete {
                stack_name: expected,
                response,
            } if expected == stack_name => response,
            other => panic!("Expected {other:?}, got delete_stack({stack_name})"),
        }
    }
}

/// Builder for `describe_stack` expectations.
pub struct DescribeExpectationBuilder {
    stack_name: String,
    expectations: StackQueue,
}

impl DescribeExpectationBuilder {
    pub fn return_record(self, record: StackRecord) {
        self.push(Ok(Some(record)));
    }

    /// Shorthand for a record with only a status.
    pub fn return_status(self, status: StackStatus) {
        let record = StackRecord::new(self.stack_name.clone(), status);
        self.push(Ok(Some(record)));
    }

    pub fn return_not_found(self) {
        self.push(Ok(None));
    }

    pub fn return_err(self, error: RemoteError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<Option<StackRecord>, RemoteError>) {
        self.expectations
            .lock()
            .unwrap()
            .push_back(StackExpectation::Describe {
                stack_name: self.stack_name,
                response,
            });
    }
}

/// Builder for `create_stack` and `delete_stack` expectations.
pub struct MutationExpectationBuilder {
    stack_name: String,
    delete: bool,
    expectations: StackQueue,
}

impl MutationExpectationBuilder {
    pub fn return_ok(self) {
        self.push(Ok(()));
    }

    pub fn return_err(self, error: RemoteError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<(), RemoteError>) {
        let stack_name = self.stack_name;
        let expectation = if self.delete {
            StackExpectation::Delete {
                stack_name,
                response,
            }
        } else {
            StackExpectation::Create {
                stack_name,
                response,
            }
        };
        self.expectations.lock().unwrap().push_back(expectation);
    }
}

/// Builder for `update_stack` expectations.
pub struct UpdateExpectationBuilder {
    stack_name: String,
    expectations: StackQueue,
}

impl UpdateExpectationBuilder {
    /// The orchestrator accepted the update and started it.
    pub fn return_ok(self) {
        self.push(Ok(UpdateOutcome::Started));
    }

    pub fn return_no_changes(self) {
        self.push(Ok(UpdateOutcome::NoChanges));
    }

    pub fn return_err(self, error: RemoteError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<UpdateOutcome, RemoteError>) {
        self.expectations
            .lock()
            .unwrap()
            .push_back(StackExpectation::Update {
                stack_name: self.stack_name,
                response,
            });
    }
}

// =============================================================================
// INVENTORY MOCK
// =============================================================================

#[derive(Debug)]
enum InventoryExpectation {
    Find {
        kind: InventoryKind,
        tag_value: String,
        response: Result<Vec<String>, RemoteError>,
    },
    InstanceTypes {
        next_token: Option<String>,
        response: Result<InstanceTypePage, RemoteError>,
    },
}

type InventoryQueue = Arc<Mutex<VecDeque<InventoryExpectation>>>;

/// Scripted [`InventoryApi`].
#[derive(Clone, Default)]
pub struct MockInventory {
    expectations: InventoryQueue,
}

impl MockInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api(&self) -> Arc<dyn InventoryApi> {
        Arc::new(self.clone())
    }

    pub fn expect_find(&mut self, kind: InventoryKind, tag_value: &str) -> FindExpectationBuilder {
        FindExpectationBuilder {
            kind,
            tag_value: tag_value.to_string(),
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_instance_types(
        &mut self,
        next_token: Option<&str>,
    ) -> InstanceTypesExpectationBuilder {
        InstanceTypesExpectationBuilder {
            next_token: next_token.map(str::to_string),
            expectations: self.expectations.clone(),
        }
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let exps = self.expectations.lock().unwrap();
        if !exps.is_empty() {
            panic!(
                "Not all expectations were met. {} remaining, next: {:?}",
                exps.len(),
                exps.front()
            );
        }
    }

    fn next(&self, call: &str) -> InventoryExpectation {
        let expectation = self.expectations.lock().unwrap().pop_front();
        match expectation {
            Some(expectation) => expectation,
            None => panic!("Unexpected call {call}: no expectations left"),
        }
    }
}

#[async_trait]
impl InventoryApi for MockInventory {
    async fn find_ids_by_tag(
        &self,
        kind: InventoryKind,
        tag_value: &str,
    ) -> Result<Vec<String>, RemoteError> {
        let call = format!("find_ids_by_tag({kind:?}, {tag_value})");
        match self.next(&call) {
            InventoryExpectation::Find {
                kind: expected_kind,
                tag_value: expected_tag,
                response,
            } if expected_kind == kind && expected_tag == tag_value => response,
            other => panic!("Expected {other:?}, got {call}"),
        }
    }

    async fn list_instance_types(
        &self,
        next_token: Option<String>,
    ) -> Result<InstanceTypePage, RemoteError> {
        let call = format!("list_instance_types({next_token:?})");
        match self.next(&call) {
            InventoryExpectation::InstanceTypes {
                next_token: expected,
                response,
            } if expected == next_token => response,
            other => panic!("Expected {other:?}, got {call}"),
        }
    }
}

/// Builder for tag lookup expectations.
pub struct FindExpectationBuilder {
    kind: InventoryKind,
    tag_value: String,
    expectations: InventoryQueue,
}

impl FindExpectationBuilder {
    pub fn return_ids<I, S>(self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Ok(ids.into_iter().map(Into::into).collect()));
    }

    pub fn return_err(self, error: RemoteError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<Vec<String>, RemoteError>) {
        self.expectations
            .lock()
            .unwrap()
            .push_back(InventoryExpectation::Find {
                kind: self.kind,
                tag_value: self.tag_value,
                response,
            });
    }
}

/// Builder for instance-type page expectations.
pub struct InstanceTypesExpectationBuilder {
    next_token: Option<String>,
    expectations: InventoryQueue,
}

impl InstanceTypesExpectationBuilder {
    pub fn return_page<I, S>(self, instance_types: I, next_token: Option<&str>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Ok(InstanceTypePage {
            instance_types: instance_types.into_iter().map(Into::into).collect(),
            next_token: next_token.map(str::to_string),
        }));
    }

    pub fn return_err(self, error: RemoteError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<InstanceTypePage, RemoteError>) {
        self.expectations
            .lock()
            .unwrap()
            .push_back(InventoryExpectation::InstanceTypes {
                next_token: self.next_token,
                response,
            });
    }
}

// =============================================================================
// CHANNEL HELPERS
// =============================================================================

/// Creates an orchestrator client whose requests land on a receiver the test
/// controls, so it can assert each message and answer it.
pub fn create_mock_client(
    buffer_size: usize,
) -> (OrchestratorClient, mpsc::Receiver<OrchestratorRequest>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (OrchestratorClient::new(sender), receiver)
}

/// Helper to verify that the next message is a Describe request
pub async fn expect_describe(
    receiver: &mut mpsc::Receiver<OrchestratorRequest>,
) -> Option<(String, Response<Option<StackRecord>>)> {
    match receiver.recv().await {
        Some(OrchestratorRequest::Describe {
            stack_name,
            respond_to,
        }) => Some((stack_name, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a Create request
pub async fn expect_create(
    receiver: &mut mpsc::Receiver<OrchestratorRequest>,
) -> Option<(String, String, Response<()>)> {
    match receiver.recv().await {
        Some(OrchestratorRequest::Create {
            stack_name,
            template_body,
            respond_to,
        }) => Some((stack_name, template_body, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a FindByTag request
pub async fn expect_find_by_tag(
    receiver: &mut mpsc::Receiver<OrchestratorRequest>,
) -> Option<(InventoryKind, String, Response<Vec<String>>)> {
    match receiver.recv().await {
        Some(OrchestratorRequest::FindByTag {
            kind,
            tag_value,
            respond_to,
        }) => Some((kind, tag_value, respond_to)),
        _ => None,
    }
}
