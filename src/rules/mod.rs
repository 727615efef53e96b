//! Termination rules: the metric expression grammar, status-code filters,
//! the per-iteration compiled rule cache and the termination check polled by
//! the schedulers.
mod checker;
mod expression;
mod filter;
mod service;


pub use checker::{TerminationCheck, TerminationChecker};
pub use expression::{Comparison, MetricExpression};
pub use filter::{DEFAULT_ERROR_FILTER, STATUS_CODE_METRIC, StatusFilterSet};
pub use service::{CompiledRule, RuleCacheKey, RuleService};
