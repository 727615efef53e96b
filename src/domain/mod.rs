//! Plan, iteration and status types shared by the scheduler, the rule
//! evaluator and the plan runner.
mod iteration;
mod plan;
mod rule;
mod status;

#[cfg(test)]
mod tests;

pub use iteration::{
    BatchPlan, Iteration, IterationContext, Mode, ModePlan, SessionSpec, SessionStep, UnitSpec,
};
pub use plan::{Round, TestPlan, fqdn};
pub use rule::TerminationRule;
pub use status::ExecutionStatus;
