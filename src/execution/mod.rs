//! Iteration execution: the command that owns an iteration's lifecycle, the
//! per-mode schedulers, the batch dispatcher and the dispatch units they fire.
mod command;
mod dispatcher;
mod scheduler;
mod unit;

#[cfg(test)]
pub(crate) mod test_support;

pub use command::{
    CommandHandle, CommandState, ExecuteCommand, ExecutionOutcome, ExecutionServices, StatusLatch,
};
pub use dispatcher::BatchDispatcher;
pub use scheduler::{
    CooldownBatchScheduler, CooldownRequestBatchScheduler, DurationCooldownBatchScheduler,
    DurationScheduler, IterationScheduler, RequestCountScheduler, ScheduleOutcome,
    SchedulerContext, StopReason, scheduler_for,
};
pub use unit::{DispatchUnit, RequestUnit, SessionUnit, build_unit};
