//! # Stack Reconciler
//!
//! Drives a named stack toward a rendered [`Document`]: create it when absent,
//! update it when present, then poll until the orchestrator reports a terminal
//! status. At most one submission is made per call and nothing is retried.
//!
//! Callers must not reconcile the same stack name concurrently.

use crate::error::ReconcileError;
use crate::remote::{StackApi, UpdateOutcome};
use crate::status::{StackRecord, StackStatus};
use crate::template::Document;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Polling schedule used while waiting for a terminal status.
#[derive(Debug, Clone, PartialEq)]
pub struct WaiterConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub timeout: Duration,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
            multiplier: 1.5,
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl WaiterConfig {
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Saturates at `max_delay`, including when the product overflows.
    fn next_delay(&self, current: Duration) -> Duration {
        let scaled = current.as_secs_f64() * self.multiplier.max(1.0);
        Duration::try_from_secs_f64(scaled)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Which mutation a wait follows; decides the expected terminal status.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Operation {
    Create,
    Update,
}

impl Operation {
    fn expected(self) -> StackStatus {
        match self {
            Operation::Create => StackStatus::CreateComplete,
            Operation::Update => StackStatus::UpdateComplete,
        }
    }
}

pub struct Reconciler {
    stacks: Arc<dyn StackApi>,
    waiter: WaiterConfig,
}

impl Reconciler {
    pub fn new(stacks: Arc<dyn StackApi>) -> Self {
        Self {
            stacks,
            waiter: WaiterConfig::default(),
        }
    }

    pub fn with_waiter(mut self, waiter: WaiterConfig) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn waiter(&self) -> &WaiterConfig {
        &self.waiter
    }

    /// Creates or updates `stack_name` so that it matches `document`.
    ///
    /// Returns the final record. An update the orchestrator reports as having
    /// nothing to do returns the current record immediately.
    #[instrument(skip(self, document), fields(resources = document.resource_count()))]
    pub async fn reconcile(
        &self,
        stack_name: &str,
        document: &Document,
    ) -> Result<StackRecord, ReconcileError> {
        let operation = match self.stacks.describe_stack(stack_name).await? {
            None => {
                info!("Stack absent, creating");
                self.stacks.create_stack(stack_name, document.body()).await?;
                Operation::Create
            }
            Some(record) if !record.status.is_terminal() => {
                warn!(status = %record.status, "Stack busy");
                return Err(ReconcileError::StackBusy {
                    stack_name: stack_name.to_string(),
                    status: record.status,
                });
            }
            Some(record) if !record.status.accepts_update() => {
                warn!(status = %record.status, "Stack not updatable");
                return Err(ReconcileError::NotUpdatable {
                    stack_name: stack_name.to_string(),
                    status: record.status,
                });
            }
            Some(record) => {
                info!(status = %record.status, "Stack exists, updating");
                match self.stacks.update_stack(stack_name, document.body()).await? {
                    UpdateOutcome::NoChanges => {
                        info!("No changes");
                        return Ok(record);
                    }
                    UpdateOutcome::Started => Operation::Update,
                }
            }
        };

        let record = self.wait_for_terminal(stack_name).await?;
        let record = match record {
            Some(record) => record,
            None => {
                return Err(ReconcileError::ReconciliationFailed {
                    stack_name: stack_name.to_string(),
                    status: StackStatus::DeleteComplete,
                    reason: Some("stack disappeared while waiting".to_string()),
                })
            }
        };

        if record.status == operation.expected() {
            info!(status = %record.status, "Reconciled");
            Ok(record)
        } else {
            warn!(status = %record.status, reason = ?record.status_reason, "Reconciliation failed");
            Err(ReconcileError::ReconciliationFailed {
                stack_name: stack_name.to_string(),
                status: record.status,
                reason: record.status_reason,
            })
        }
    }

    /// Deletes `stack_name` and waits until it is gone. An absent stack is a no-op.
    #[instrument(skip(self))]
    pub async fn destroy(&self, stack_name: &str) -> Result<(), ReconcileError> {
        match self.stacks.describe_stack(stack_name).await? {
            None => {
                info!("Stack absent, nothing to delete");
                return Ok(());
            }
            Some(record) if record.status == StackStatus::DeleteInProgress => {
                info!("Delete already in progress");
            }
            Some(record) if !record.status.is_terminal() => {
                return Err(ReconcileError::StackBusy {
                    stack_name: stack_name.to_string(),
                    status: record.status,
                });
            }
            Some(_) => {
                self.stacks.delete_stack(stack_name).await?;
                info!("Delete submitted");
            }
        }

        match self.wait_for_terminal(stack_name).await? {
            None => {
                info!("Deleted");
                Ok(())
            }
            Some(record) if record.status == StackStatus::DeleteComplete => {
                info!("Deleted");
                Ok(())
            }
            Some(record) => Err(ReconcileError::ReconciliationFailed {
                stack_name: stack_name.to_string(),
                status: record.status,
                reason: record.status_reason,
            }),
        }
    }

    /// Polls until the stack is terminal or gone. The first poll is immediate.
    async fn wait_for_terminal(
        &self,
        stack_name: &str,
    ) -> Result<Option<StackRecord>, ReconcileError> {
        let started = Instant::now();
        let mut delay = self.waiter.initial_delay;
        let mut last_status = None;
        let mut polls = 0u32;

        loop {
            polls += 1;
            let record = match self.stacks.describe_stack(stack_name).await? {
                Some(record) => record,
                None => return Ok(None),
            };
            if record.status.is_terminal() {
                debug!(polls, status = %record.status, "Terminal status");
                return Ok(Some(record));
            }
            debug!(polls, status = %record.status, "Waiting");
            last_status = Some(record.status);

            let elapsed = started.elapsed();
            if elapsed >= self.waiter.timeout {
                return Err(ReconcileError::Timeout {
                    stack_name: stack_name.to_string(),
                    last_status,
                });
            }
            tokio::time::sleep(delay.min(self.waiter.timeout - elapsed)).await;
            delay = self.waiter.next_delay(delay);
        }
    }
}
