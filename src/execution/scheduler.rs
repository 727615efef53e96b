mod batch;
mod single;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::admission::AdmissionController;
use crate::domain::{ExecutionStatus, IterationContext, ModePlan};
use crate::error::AppResult;
use crate::rules::TerminationCheck;

use super::command::CommandHandle;
use super::dispatcher::BatchDispatcher;

pub use batch::{
    CooldownBatchScheduler, CooldownRequestBatchScheduler, DurationCooldownBatchScheduler,
};
pub use single::{DurationScheduler, RequestCountScheduler};

/// Thirty years; stands in for "no deadline" when `now + duration` overflows.
const FAR_FUTURE: Duration = Duration::from_secs(946_080_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The mode's own limit was reached.
    Completed,
    Cancelled,
    /// A termination rule fired.
    Terminated,
}

impl StopReason {
    #[must_use]
    pub const fn status(self) -> ExecutionStatus {
        match self {
            StopReason::Completed => ExecutionStatus::Success,
            StopReason::Cancelled => ExecutionStatus::Cancelled,
            StopReason::Terminated => ExecutionStatus::Terminated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleOutcome {
    /// Dispatches actually started.
    pub dispatched: u64,
    pub stop: StopReason,
}

/// Drives one iteration's dispatch loop for a single mode.
#[async_trait]
pub trait IterationScheduler: Send + Sync {
    /// Runs until the mode's limit is reached, a termination rule fires or
    /// `cancel` is triggered. Dispatches already started are awaited before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns an error when a batch task panics.
    async fn execute(&self, cancel: &CancellationToken) -> AppResult<ScheduleOutcome>;
}

#[derive(Clone)]
pub struct SchedulerContext {
    pub command: CommandHandle,
    pub dispatcher: Arc<BatchDispatcher>,
    pub admission: Arc<AdmissionController>,
    pub termination: Arc<dyn TerminationCheck>,
    pub iteration: Arc<IterationContext>,
}

impl SchedulerContext {
    /// Polls the termination check and latches `Terminated` when it fires.
    async fn termination_required(&self, cancel: &CancellationToken) -> bool {
        let required = self
            .termination
            .is_termination_required(&self.iteration, cancel)
            .await;
        if required {
            self.command
                .state()
                .status()
                .raise(ExecutionStatus::Terminated);
            info!(fqdn = self.command.fqdn(), "Iteration terminated by rule.");
        }
        required
    }
}

#[must_use]
pub fn scheduler_for(plan: ModePlan, context: SchedulerContext) -> Box<dyn IterationScheduler> {
    match plan {
        ModePlan::Duration { duration } => Box::new(DurationScheduler::new(context, duration)),
        ModePlan::RequestCount { request_count } => {
            Box::new(RequestCountScheduler::new(context, request_count))
        }
        ModePlan::CooldownBatch { batch } => Box::new(CooldownBatchScheduler::new(context, batch)),
        ModePlan::CooldownRequestBatch {
            request_count,
            batch,
        } => Box::new(CooldownRequestBatchScheduler::new(
            context,
            request_count,
            batch,
        )),
        ModePlan::DurationCooldownBatch { duration, batch } => Box::new(
            DurationCooldownBatchScheduler::new(context, duration, batch),
        ),
    }
}

fn deadline_after(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}
