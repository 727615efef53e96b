use thiserror::Error;

use crate::domain::Mode;

use super::RulesError;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LimitField {
    #[error("request_count")]
    RequestCount,
    #[error("duration")]
    Duration,
    #[error("batch_size")]
    BatchSize,
    #[error("cool_down_time")]
    CoolDownTime,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Iteration '{iteration}' in mode {mode} requires {field}.")]
    MissingLimit {
        iteration: String,
        mode: Mode,
        field: LimitField,
    },
    #[error("Iteration '{iteration}' in mode {mode} must not set {field}.")]
    UnexpectedLimit {
        iteration: String,
        mode: Mode,
        field: LimitField,
    },
    #[error("Iteration '{iteration}' has {field} = 0; it must be > 0.")]
    ZeroLimit {
        iteration: String,
        field: LimitField,
    },
    #[error(
        "Termination rule #{index} of iteration '{iteration}' is half specified; set error_status_codes, max_error_rate and grace_period together or leave all empty."
    )]
    HalfSpecifiedRule { iteration: String, index: usize },
    #[error(
        "Termination rule #{index} of iteration '{iteration}' has max_error_rate {value}; expected 0..=1."
    )]
    MaxErrorRateOutOfRange {
        iteration: String,
        index: usize,
        value: f64,
    },
    #[error("Termination rule #{index} of iteration '{iteration}' has an invalid filter: {source}")]
    InvalidRuleFilter {
        iteration: String,
        index: usize,
        #[source]
        source: RulesError,
    },
    #[error("Plan name must not be empty.")]
    EmptyPlanName,
    #[error("Plan '{plan}' has no rounds.")]
    NoRounds { plan: String },
    #[error("Round name must not be empty.")]
    EmptyRoundName,
    #[error("Round '{round}' has no iterations.")]
    NoIterations { round: String },
    #[error("Round '{round}' needs at least one client.")]
    ZeroClients { round: String },
    #[error("Iteration name must not be empty (round '{round}').")]
    EmptyIterationName { round: String },
    #[error("Round '{round}' defines iteration '{iteration}' more than once.")]
    DuplicateIteration { round: String, iteration: String },
    #[error("Iteration '{iteration}' must define either a request or a session.")]
    MissingDispatchUnit { iteration: String },
    #[error("Iteration '{iteration}' cannot define both a request and a session.")]
    ConflictingDispatchUnit { iteration: String },
    #[error("Session of iteration '{iteration}' has no steps.")]
    EmptySession { iteration: String },
    #[error("Duration must not be empty.")]
    DurationEmpty,
    #[error("Invalid duration '{value}'.")]
    InvalidDurationFormat { value: String },
    #[error("Invalid duration '{value}': {source}")]
    InvalidDurationNumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Duration overflow.")]
    DurationOverflow,
    #[error("Invalid duration unit '{unit}'.")]
    InvalidDurationUnit { unit: String },
    #[error("Duration must be > 0.")]
    DurationZero,
}
