use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use serde::Serialize;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::admission::AdmissionController;
use crate::domain::{ExecutionStatus, Iteration, IterationContext, Mode, ModePlan, fqdn};
use crate::error::{AppResult, ValidationError};
use crate::metrics::{MetricsEmitter, ResponseRecord};
use crate::rules::{StatusFilterSet, TerminationCheck};

use super::dispatcher::BatchDispatcher;
use super::scheduler::{ScheduleOutcome, SchedulerContext, StopReason, scheduler_for};
use super::unit::DispatchUnit;

/// Monotonic status cell: a status only ever moves to a higher rank.
#[derive(Debug)]
pub struct StatusLatch {
    status: AtomicU8,
}

impl StatusLatch {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: AtomicU8::new(ExecutionStatus::NotStarted.to_index()),
        }
    }

    #[must_use]
    pub fn current(&self) -> ExecutionStatus {
        ExecutionStatus::from_index(self.status.load(Ordering::Acquire))
    }

    /// Merges `status` in and returns the resulting value.
    pub fn raise(&self, status: ExecutionStatus) -> ExecutionStatus {
        let mut current = self.status.load(Ordering::Acquire);
        loop {
            let existing = ExecutionStatus::from_index(current);
            let merged = existing.merge(status);
            if merged == existing {
                return existing;
            }
            match self.status.compare_exchange(
                current,
                merged.to_index(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return merged,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for StatusLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters and status shared by every dispatch of one iteration.
pub struct CommandState {
    fqdn: String,
    error_filter: StatusFilterSet,
    emitter: Arc<dyn MetricsEmitter>,
    successful: AtomicU64,
    failed: AtomicU64,
    status: StatusLatch,
}

impl CommandState {
    #[must_use]
    pub fn new(
        fqdn: String,
        error_filter: StatusFilterSet,
        emitter: Arc<dyn MetricsEmitter>,
    ) -> Self {
        Self {
            fqdn,
            error_filter,
            emitter,
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            status: StatusLatch::new(),
        }
    }

    #[must_use]
    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    /// Counts the response as failed when it matches the iteration's error
    /// filter or never reached the server, then forwards it to the emitter.
    pub fn record_response(&self, record: ResponseRecord) {
        if record.transport_error || self.error_filter.matches(record.status_code) {
            self.increment_failed();
        } else {
            self.increment_successful();
        }
        self.emitter.response_recorded(&self.fqdn, &record);
    }

    pub fn increment_successful(&self) {
        self.successful.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn successful(&self) -> u64 {
        self.successful.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub const fn status(&self) -> &StatusLatch {
        &self.status
    }
}

/// What a scheduler dispatches: the unit plus the state it reports into.
#[derive(Clone)]
pub struct CommandHandle {
    unit: Arc<dyn DispatchUnit>,
    state: Arc<CommandState>,
}

impl CommandHandle {
    #[must_use]
    pub fn new(unit: Arc<dyn DispatchUnit>, state: Arc<CommandState>) -> Self {
        Self { unit, state }
    }

    #[must_use]
    pub fn target_host(&self) -> &str {
        self.unit.target_host()
    }

    #[must_use]
    pub fn fqdn(&self) -> &str {
        self.state.fqdn()
    }

    #[must_use]
    pub const fn state(&self) -> &Arc<CommandState> {
        &self.state
    }

    pub async fn dispatch(&self, cancel: &CancellationToken) {
        self.unit.dispatch(&self.state, cancel).await;
    }
}

/// Process-wide collaborators shared by every command.
#[derive(Clone)]
pub struct ExecutionServices {
    pub admission: Arc<AdmissionController>,
    pub termination: Arc<dyn TerminationCheck>,
    pub emitter: Arc<dyn MetricsEmitter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub fqdn: String,
    pub mode: Mode,
    pub status: ExecutionStatus,
    pub dispatched: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionOutcome {
    /// Outcome for an iteration that was never started because it failed
    /// validation.
    #[must_use]
    pub fn skipped(fqdn: String, mode: Mode, error: &ValidationError) -> Self {
        Self {
            fqdn,
            mode,
            status: ExecutionStatus::Skipped,
            dispatched: 0,
            successful_calls: 0,
            failed_calls: 0,
            elapsed_ms: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Runs one iteration for one client: startup delay, the mode's scheduler
/// and the final status merge.
pub struct ExecuteCommand {
    iteration: Arc<Iteration>,
    plan: ModePlan,
    context: Arc<IterationContext>,
    handle: CommandHandle,
    services: ExecutionServices,
}

impl ExecuteCommand {
    /// # Errors
    ///
    /// Returns an error when the iteration's limits do not fit its mode or a
    /// termination rule is malformed.
    pub fn new(
        iteration: Arc<Iteration>,
        plan_name: &str,
        round_name: &str,
        unit: Arc<dyn DispatchUnit>,
        services: ExecutionServices,
    ) -> Result<Self, ValidationError> {
        let plan = iteration.validate()?;
        let fqdn = fqdn(plan_name, round_name, &iteration.name);
        let context = Arc::new(IterationContext {
            fqdn: fqdn.clone(),
            iteration_id: iteration.name.clone(),
            round_name: round_name.to_owned(),
            termination_rules: Arc::from(iteration.termination_rules.as_slice()),
        });
        let state = Arc::new(CommandState::new(
            fqdn,
            iteration.error_status_codes.clone(),
            Arc::clone(&services.emitter),
        ));
        Ok(Self {
            iteration,
            plan,
            context,
            handle: CommandHandle::new(unit, state),
            services,
        })
    }

    #[must_use]
    pub const fn plan(&self) -> ModePlan {
        self.plan
    }

    #[must_use]
    pub const fn state(&self) -> &Arc<CommandState> {
        self.handle.state()
    }

    pub async fn execute(&self, cancel: &CancellationToken) -> ExecutionOutcome {
        let started = Instant::now();
        let state = self.handle.state();
        state.status().raise(ExecutionStatus::Ongoing);
        self.services.emitter.iteration_started(state.fqdn());
        info!(
            fqdn = state.fqdn(),
            mode = self.iteration.mode.as_str(),
            "Iteration started."
        );

        let result = if self.wait_startup_delay(cancel).await {
            self.schedule(cancel).await
        } else {
            Ok(ScheduleOutcome {
                dispatched: 0,
                stop: StopReason::Cancelled,
            })
        };

        let (loop_status, dispatched, error) = match result {
            Ok(outcome) => (outcome.stop.status(), outcome.dispatched, None),
            Err(err) => {
                error!(fqdn = state.fqdn(), "Iteration failed: {}", err);
                (ExecutionStatus::Failed, 0, Some(err.to_string()))
            }
        };
        let status = state.status().raise(loop_status);
        self.services.termination.iteration_finished(&self.context);
        self.services
            .emitter
            .iteration_finished(state.fqdn(), status, dispatched);

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            fqdn = state.fqdn(),
            status = status.as_str(),
            dispatched,
            successful = state.successful(),
            failed = state.failed(),
            elapsed_ms,
            "Iteration finished."
        );
        ExecutionOutcome {
            fqdn: state.fqdn().to_owned(),
            mode: self.iteration.mode,
            status,
            dispatched,
            successful_calls: state.successful(),
            failed_calls: state.failed(),
            elapsed_ms,
            error,
        }
    }

    /// Returns `false` if cancelled during the delay.
    async fn wait_startup_delay(&self, cancel: &CancellationToken) -> bool {
        let Some(delay) = self.iteration.startup_delay.filter(|delay| !delay.is_zero()) else {
            return !cancel.is_cancelled();
        };
        tokio::select! {
            () = cancel.cancelled() => false,
            () = sleep(delay) => true,
        }
    }

    async fn schedule(&self, cancel: &CancellationToken) -> AppResult<ScheduleOutcome> {
        let context = SchedulerContext {
            command: self.handle.clone(),
            dispatcher: Arc::new(BatchDispatcher::new(
                Arc::clone(&self.services.admission),
                Arc::clone(&self.services.emitter),
            )),
            admission: Arc::clone(&self.services.admission),
            termination: Arc::clone(&self.services.termination),
            iteration: Arc::clone(&self.context),
        };
        scheduler_for(self.plan, context).execute(cancel).await
    }
}
