use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LimitField, ValidationError};
use crate::http::RequestSpec;
use crate::rules::StatusFilterSet;

use super::rule::TerminationRule;

/// Temporal policy that decides when and how many requests an iteration
/// fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Mode {
    /// Fire one request after another until the duration elapses.
    #[serde(rename = "D", alias = "duration")]
    Duration,
    /// Fire one request after another until the request count is reached.
    #[serde(rename = "R", alias = "request_count")]
    RequestCount,
    /// Fire batches separated by a cooldown until cancelled or terminated.
    #[serde(rename = "CB", alias = "cooldown_batch")]
    CooldownBatch,
    /// Fire batches separated by a cooldown until the request count is spent.
    #[serde(rename = "CRB", alias = "cooldown_request_batch")]
    CooldownRequestBatch,
    /// Fire batches separated by a cooldown until the duration elapses.
    #[serde(rename = "DCB", alias = "duration_cooldown_batch")]
    DurationCooldownBatch,
}

impl Mode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Mode::Duration => "D",
            Mode::RequestCount => "R",
            Mode::CooldownBatch => "CB",
            Mode::CooldownRequestBatch => "CRB",
            Mode::DurationCooldownBatch => "DCB",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub batch_size: u64,
    pub cool_down: Duration,
    pub maximize_throughput: bool,
}

/// Limits of an iteration after validation, one variant per [`Mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModePlan {
    Duration {
        duration: Duration,
    },
    RequestCount {
        request_count: u64,
    },
    CooldownBatch {
        batch: BatchPlan,
    },
    CooldownRequestBatch {
        request_count: u64,
        batch: BatchPlan,
    },
    DurationCooldownBatch {
        duration: Duration,
        batch: BatchPlan,
    },
}

#[derive(Debug, Clone)]
pub struct SessionStep {
    pub name: Option<String>,
    pub request: RequestSpec,
    pub think_time: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub steps: Vec<SessionStep>,
}

/// What a single dispatch sends: one request, or a session of ordered steps.
#[derive(Debug, Clone)]
pub enum UnitSpec {
    Request(RequestSpec),
    Session(SessionSpec),
}

impl UnitSpec {
    #[must_use]
    pub fn target_host(&self) -> &str {
        match self {
            UnitSpec::Request(request) => request.host(),
            UnitSpec::Session(session) => session
                .steps
                .first()
                .map_or("", |step| step.request.host()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Iteration {
    pub name: String,
    pub mode: Mode,
    pub request_count: Option<u64>,
    pub duration: Option<Duration>,
    pub batch_size: Option<u64>,
    pub cool_down_time: Option<Duration>,
    pub maximize_throughput: bool,
    pub termination_rules: Vec<TerminationRule>,
    pub error_status_codes: StatusFilterSet,
    pub startup_delay: Option<Duration>,
    pub unit: UnitSpec,
}

impl Iteration {
    /// Checks the mode/limit combination and the termination rules.
    ///
    /// # Errors
    ///
    /// Returns an error when a limit required by the mode is missing or zero,
    /// when a limit the mode does not use is set, or when a termination rule
    /// is half specified or has an unparsable filter.
    pub fn validate(&self) -> Result<ModePlan, ValidationError> {
        self.validate_rules()?;
        if let UnitSpec::Session(session) = &self.unit
            && session.steps.is_empty()
        {
            return Err(ValidationError::EmptySession {
                iteration: self.name.clone(),
            });
        }

        let plan = match self.mode {
            Mode::Duration => {
                self.forbid(LimitField::RequestCount, self.request_count.is_some())?;
                self.forbid(LimitField::BatchSize, self.batch_size.is_some())?;
                self.forbid(LimitField::CoolDownTime, self.cool_down_time.is_some())?;
                ModePlan::Duration {
                    duration: self.required_duration()?,
                }
            }
            Mode::RequestCount => {
                self.forbid(LimitField::Duration, self.duration.is_some())?;
                self.forbid(LimitField::BatchSize, self.batch_size.is_some())?;
                self.forbid(LimitField::CoolDownTime, self.cool_down_time.is_some())?;
                ModePlan::RequestCount {
                    request_count: self.required_request_count()?,
                }
            }
            Mode::CooldownBatch => {
                self.forbid(LimitField::RequestCount, self.request_count.is_some())?;
                self.forbid(LimitField::Duration, self.duration.is_some())?;
                ModePlan::CooldownBatch {
                    batch: self.required_batch()?,
                }
            }
            Mode::CooldownRequestBatch => {
                self.forbid(LimitField::Duration, self.duration.is_some())?;
                ModePlan::CooldownRequestBatch {
                    request_count: self.required_request_count()?,
                    batch: self.required_batch()?,
                }
            }
            Mode::DurationCooldownBatch => {
                self.forbid(LimitField::RequestCount, self.request_count.is_some())?;
                ModePlan::DurationCooldownBatch {
                    duration: self.required_duration()?,
                    batch: self.required_batch()?,
                }
            }
        };
        Ok(plan)
    }

    fn validate_rules(&self) -> Result<(), ValidationError> {
        for (index, rule) in self.termination_rules.iter().enumerate() {
            if rule.is_noop() {
                continue;
            }
            if !rule.is_complete() {
                return Err(ValidationError::HalfSpecifiedRule {
                    iteration: self.name.clone(),
                    index,
                });
            }
            if !(0.0..=1.0).contains(&rule.max_error_rate) {
                return Err(ValidationError::MaxErrorRateOutOfRange {
                    iteration: self.name.clone(),
                    index,
                    value: rule.max_error_rate,
                });
            }
            StatusFilterSet::parse(&rule.error_status_codes).map_err(|source| {
                ValidationError::InvalidRuleFilter {
                    iteration: self.name.clone(),
                    index,
                    source,
                }
            })?;
        }
        Ok(())
    }

    fn forbid(&self, field: LimitField, present: bool) -> Result<(), ValidationError> {
        if present {
            return Err(ValidationError::UnexpectedLimit {
                iteration: self.name.clone(),
                mode: self.mode,
                field,
            });
        }
        Ok(())
    }

    fn missing(&self, field: LimitField) -> ValidationError {
        ValidationError::MissingLimit {
            iteration: self.name.clone(),
            mode: self.mode,
            field,
        }
    }

    fn zero(&self, field: LimitField) -> ValidationError {
        ValidationError::ZeroLimit {
            iteration: self.name.clone(),
            field,
        }
    }

    fn required_request_count(&self) -> Result<u64, ValidationError> {
        match self.request_count {
            None => Err(self.missing(LimitField::RequestCount)),
            Some(0) => Err(self.zero(LimitField::RequestCount)),
            Some(count) => Ok(count),
        }
    }

    fn required_duration(&self) -> Result<Duration, ValidationError> {
        match self.duration {
            None => Err(self.missing(LimitField::Duration)),
            Some(duration) if duration.is_zero() => Err(self.zero(LimitField::Duration)),
            Some(duration) => Ok(duration),
        }
    }

    fn required_batch(&self) -> Result<BatchPlan, ValidationError> {
        let batch_size = match self.batch_size {
            None => return Err(self.missing(LimitField::BatchSize)),
            Some(0) => return Err(self.zero(LimitField::BatchSize)),
            Some(size) => size,
        };
        let cool_down = match self.cool_down_time {
            None => return Err(self.missing(LimitField::CoolDownTime)),
            Some(cool_down) if cool_down.is_zero() => {
                return Err(self.zero(LimitField::CoolDownTime));
            }
            Some(cool_down) => cool_down,
        };
        Ok(BatchPlan {
            batch_size,
            cool_down,
            maximize_throughput: self.maximize_throughput,
        })
    }
}

/// Identity of a running iteration as seen by the termination evaluator.
#[derive(Debug, Clone)]
pub struct IterationContext {
    pub fqdn: String,
    pub iteration_id: String,
    pub round_name: String,
    pub termination_rules: Arc<[TerminationRule]>,
}
