use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::domain::BatchPlan;
use crate::error::{AppError, AppResult};

use super::{
    IterationScheduler, ScheduleOutcome, SchedulerContext, StopReason, deadline_after,
};

#[derive(Debug, Clone, Copy)]
enum BatchLimit {
    Unbounded,
    Requests(u64),
    Deadline(Instant),
}

impl BatchLimit {
    /// Size of the next batch, or `None` once the limit is spent.
    fn next_batch(self, batch_size: u64) -> Option<u64> {
        match self {
            BatchLimit::Unbounded => Some(batch_size),
            BatchLimit::Requests(remaining) => {
                (remaining > 0).then_some(batch_size.min(remaining))
            }
            BatchLimit::Deadline(deadline) => (Instant::now() < deadline).then_some(batch_size),
        }
    }

    fn consume(&mut self, sent: u64) {
        if let BatchLimit::Requests(remaining) = self {
            *remaining = remaining.saturating_sub(sent);
        }
    }

    fn is_spent(self) -> bool {
        self.next_batch(1).is_none()
    }

    fn allows_dispatch(self) -> bool {
        match self {
            BatchLimit::Deadline(deadline) => Instant::now() < deadline,
            BatchLimit::Unbounded | BatchLimit::Requests(_) => true,
        }
    }

    fn clamp(self, wake_at: Instant) -> Instant {
        match self {
            BatchLimit::Deadline(deadline) => wake_at.min(deadline),
            BatchLimit::Unbounded | BatchLimit::Requests(_) => wake_at,
        }
    }
}

async fn run_batches(
    context: &SchedulerContext,
    plan: BatchPlan,
    limit: BatchLimit,
    cancel: &CancellationToken,
) -> AppResult<ScheduleOutcome> {
    if plan.maximize_throughput {
        run_overlapping(context, plan, limit, cancel).await
    } else {
        Ok(run_sequential(context, plan, limit, cancel).await)
    }
}

/// Each batch completes before the cooldown starts.
async fn run_sequential(
    context: &SchedulerContext,
    plan: BatchPlan,
    mut limit: BatchLimit,
    cancel: &CancellationToken,
) -> ScheduleOutcome {
    let mut dispatched: u64 = 0;
    let stop = loop {
        if cancel.is_cancelled() {
            break StopReason::Cancelled;
        }
        let Some(size) = limit.next_batch(plan.batch_size) else {
            break StopReason::Completed;
        };
        if context.termination_required(cancel).await {
            break StopReason::Terminated;
        }

        let batch_started = Instant::now();
        let bound = limit;
        let sent = context
            .dispatcher
            .send_batch(
                &context.command,
                size,
                || !cancel.is_cancelled() && bound.allows_dispatch(),
                cancel,
            )
            .await;
        dispatched = dispatched.saturating_add(sent);
        limit.consume(sent);
        debug!(
            fqdn = context.command.fqdn(),
            size,
            sent,
            elapsed_ms = batch_started.elapsed().as_millis(),
            "Batch completed."
        );
        if limit.is_spent() {
            break StopReason::Completed;
        }

        let wake_at = limit.clamp(deadline_after(plan.cool_down));
        tokio::select! {
            () = cancel.cancelled() => break StopReason::Cancelled,
            () = sleep_until(wake_at) => {}
        }
    };
    ScheduleOutcome { dispatched, stop }
}

/// Batches start every `cool_down` regardless of whether the previous one
/// has finished; all of them are awaited before returning. Finished batches
/// are collected at every cycle so the set only holds running ones.
async fn run_overlapping(
    context: &SchedulerContext,
    plan: BatchPlan,
    mut limit: BatchLimit,
    cancel: &CancellationToken,
) -> AppResult<ScheduleOutcome> {
    let halted = Arc::new(AtomicBool::new(false));
    let mut batches: JoinSet<u64> = JoinSet::new();
    let mut tally = BatchTally::default();
    let stop = loop {
        while let Some(joined) = batches.try_join_next() {
            tally.add(context, joined);
        }
        if cancel.is_cancelled() {
            break StopReason::Cancelled;
        }
        let Some(size) = limit.next_batch(plan.batch_size) else {
            break StopReason::Completed;
        };
        if context.termination_required(cancel).await {
            halted.store(true, Ordering::Release);
            break StopReason::Terminated;
        }

        let batch_started = Instant::now();
        batches.spawn(batch_task(context, size, limit, &halted, cancel));
        limit.consume(size);
        if limit.is_spent() {
            break StopReason::Completed;
        }

        let next_start = batch_started
            .checked_add(plan.cool_down)
            .unwrap_or_else(|| deadline_after(plan.cool_down));
        tokio::select! {
            () = cancel.cancelled() => break StopReason::Cancelled,
            () = sleep_until(limit.clamp(next_start)) => {}
        }
    };

    while let Some(joined) = batches.join_next().await {
        tally.add(context, joined);
    }
    tally.finish(stop)
}

#[derive(Default)]
struct BatchTally {
    dispatched: u64,
    failure: Option<JoinError>,
}

impl BatchTally {
    fn add(&mut self, context: &SchedulerContext, joined: Result<u64, JoinError>) {
        match joined {
            Ok(sent) => self.dispatched = self.dispatched.saturating_add(sent),
            Err(err) => {
                error!(fqdn = context.command.fqdn(), "Batch task failed: {}", err);
                self.failure.get_or_insert(err);
            }
        }
    }

    fn finish(self, stop: StopReason) -> AppResult<ScheduleOutcome> {
        if let Some(err) = self.failure {
            return Err(AppError::from(err));
        }
        Ok(ScheduleOutcome {
            dispatched: self.dispatched,
            stop,
        })
    }
}

fn batch_task(
    context: &SchedulerContext,
    size: u64,
    limit: BatchLimit,
    halted: &Arc<AtomicBool>,
    cancel: &CancellationToken,
) -> impl Future<Output = u64> + Send + 'static {
    let dispatcher = Arc::clone(&context.dispatcher);
    let command = context.command.clone();
    let halted = Arc::clone(halted);
    let cancel = cancel.clone();
    async move {
        dispatcher
            .send_batch(
                &command,
                size,
                || {
                    !cancel.is_cancelled()
                        && !halted.load(Ordering::Acquire)
                        && limit.allows_dispatch()
                },
                &cancel,
            )
            .await
    }
}

/// CB: batches of `batch_size` every `cool_down` until cancelled or
/// terminated.
pub struct CooldownBatchScheduler {
    context: SchedulerContext,
    plan: BatchPlan,
}

impl CooldownBatchScheduler {
    #[must_use]
    pub const fn new(context: SchedulerContext, plan: BatchPlan) -> Self {
        Self { context, plan }
    }
}

#[async_trait]
impl IterationScheduler for CooldownBatchScheduler {
    async fn execute(&self, cancel: &CancellationToken) -> AppResult<ScheduleOutcome> {
        run_batches(&self.context, self.plan, BatchLimit::Unbounded, cancel).await
    }
}

/// CRB: like CB, stopping once `request_count` dispatches are spent; the
/// last batch is `request_count % batch_size` when that is non-zero.
pub struct CooldownRequestBatchScheduler {
    context: SchedulerContext,
    request_count: u64,
    plan: BatchPlan,
}

impl CooldownRequestBatchScheduler {
    #[must_use]
    pub const fn new(context: SchedulerContext, request_count: u64, plan: BatchPlan) -> Self {
        Self {
            context,
            request_count,
            plan,
        }
    }
}

#[async_trait]
impl IterationScheduler for CooldownRequestBatchScheduler {
    async fn execute(&self, cancel: &CancellationToken) -> AppResult<ScheduleOutcome> {
        let limit = BatchLimit::Requests(self.request_count);
        run_batches(&self.context, self.plan, limit, cancel).await
    }
}

/// DCB: like CB, stopping at the deadline. Cooldown sleeps never run past
/// it.
pub struct DurationCooldownBatchScheduler {
    context: SchedulerContext,
    duration: Duration,
    plan: BatchPlan,
}

impl DurationCooldownBatchScheduler {
    #[must_use]
    pub const fn new(context: SchedulerContext, duration: Duration, plan: BatchPlan) -> Self {
        Self {
            context,
            duration,
            plan,
        }
    }
}

#[async_trait]
impl IterationScheduler for DurationCooldownBatchScheduler {
    async fn execute(&self, cancel: &CancellationToken) -> AppResult<ScheduleOutcome> {
        let limit = BatchLimit::Deadline(deadline_after(self.duration));
        run_batches(&self.context, self.plan, limit, cancel).await
    }
}
