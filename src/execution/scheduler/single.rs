use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;

use super::{
    IterationScheduler, ScheduleOutcome, SchedulerContext, StopReason, deadline_after,
};

#[derive(Debug, Clone, Copy)]
enum SingleBound {
    Deadline(Instant),
    Count(u64),
}

impl SingleBound {
    fn reached(self, dispatched: u64) -> bool {
        match self {
            SingleBound::Deadline(deadline) => Instant::now() >= deadline,
            SingleBound::Count(count) => dispatched >= count,
        }
    }
}

/// One request at a time: check limit, cancellation and termination, wait
/// for admission, dispatch and await.
async fn run_single(
    context: &SchedulerContext,
    bound: SingleBound,
    cancel: &CancellationToken,
) -> ScheduleOutcome {
    let mut dispatched: u64 = 0;
    let stop = loop {
        if cancel.is_cancelled() {
            break StopReason::Cancelled;
        }
        if bound.reached(dispatched) {
            break StopReason::Completed;
        }
        if context.termination_required(cancel).await {
            break StopReason::Terminated;
        }
        context
            .admission
            .balance(context.command.target_host(), cancel)
            .await;
        if cancel.is_cancelled() {
            break StopReason::Cancelled;
        }
        context.command.dispatch(cancel).await;
        dispatched = dispatched.saturating_add(1);
    };
    ScheduleOutcome { dispatched, stop }
}

pub struct DurationScheduler {
    context: SchedulerContext,
    duration: Duration,
}

impl DurationScheduler {
    #[must_use]
    pub const fn new(context: SchedulerContext, duration: Duration) -> Self {
        Self { context, duration }
    }
}

#[async_trait]
impl IterationScheduler for DurationScheduler {
    async fn execute(&self, cancel: &CancellationToken) -> AppResult<ScheduleOutcome> {
        let bound = SingleBound::Deadline(deadline_after(self.duration));
        Ok(run_single(&self.context, bound, cancel).await)
    }
}

pub struct RequestCountScheduler {
    context: SchedulerContext,
    request_count: u64,
}

impl RequestCountScheduler {
    #[must_use]
    pub const fn new(context: SchedulerContext, request_count: u64) -> Self {
        Self {
            context,
            request_count,
        }
    }
}

#[async_trait]
impl IterationScheduler for RequestCountScheduler {
    async fn execute(&self, cancel: &CancellationToken) -> AppResult<ScheduleOutcome> {
        let bound = SingleBound::Count(self.request_count);
        Ok(run_single(&self.context, bound, cancel).await)
    }
}
