use std::sync::Arc;
use std::time::Duration;

use crate::error::{LimitField, ValidationError};
use crate::execution::test_support::iteration;

use super::{
    BatchPlan, ExecutionStatus, Iteration, Mode, ModePlan, Round, TerminationRule, TestPlan, fqdn,
};

fn with_limits(
    mode: Mode,
    request_count: Option<u64>,
    duration: Option<Duration>,
    batch: Option<(u64, Duration)>,
) -> Result<Iteration, String> {
    let mut iteration = iteration(mode)?;
    iteration.request_count = request_count;
    iteration.duration = duration;
    iteration.batch_size = batch.map(|(size, _)| size);
    iteration.cool_down_time = batch.map(|(_, cool_down)| cool_down);
    Ok(iteration)
}

fn complete_rule() -> TerminationRule {
    TerminationRule {
        error_status_codes: vec!["StatusCode >= 500".to_owned()],
        max_error_rate: 0.5,
        grace_period: Duration::from_secs(30),
    }
}

#[test]
fn each_mode_accepts_its_own_limits() -> Result<(), String> {
    let batch = BatchPlan {
        batch_size: 10,
        cool_down: Duration::from_secs(1),
        maximize_throughput: false,
    };
    let minute = Duration::from_secs(60);
    let cases = [
        (
            with_limits(Mode::Duration, None, Some(minute), None)?,
            ModePlan::Duration { duration: minute },
        ),
        (
            with_limits(Mode::RequestCount, Some(7), None, None)?,
            ModePlan::RequestCount { request_count: 7 },
        ),
        (
            with_limits(Mode::CooldownBatch, None, None, Some((10, Duration::from_secs(1))))?,
            ModePlan::CooldownBatch { batch },
        ),
        (
            with_limits(
                Mode::CooldownRequestBatch,
                Some(25),
                None,
                Some((10, Duration::from_secs(1))),
            )?,
            ModePlan::CooldownRequestBatch {
                request_count: 25,
                batch,
            },
        ),
        (
            with_limits(
                Mode::DurationCooldownBatch,
                None,
                Some(minute),
                Some((10, Duration::from_secs(1))),
            )?,
            ModePlan::DurationCooldownBatch {
                duration: minute,
                batch,
            },
        ),
    ];
    for (iteration, expected) in cases {
        let plan = iteration.validate().map_err(|err| err.to_string())?;
        if plan != expected {
            return Err(format!("{} produced {:?}", iteration.mode, plan));
        }
    }
    Ok(())
}

#[test]
fn missing_unexpected_and_zero_limits_are_rejected() -> Result<(), String> {
    let cases = [
        (
            with_limits(Mode::Duration, None, None, None)?,
            LimitField::Duration,
            "missing",
        ),
        (
            with_limits(Mode::RequestCount, Some(5), Some(Duration::from_secs(1)), None)?,
            LimitField::Duration,
            "unexpected",
        ),
        (
            with_limits(Mode::CooldownBatch, None, None, None)?,
            LimitField::BatchSize,
            "missing",
        ),
        (
            with_limits(Mode::CooldownBatch, None, None, Some((0, Duration::from_secs(1))))?,
            LimitField::BatchSize,
            "zero",
        ),
        (
            with_limits(Mode::CooldownBatch, None, None, Some((5, Duration::ZERO)))?,
            LimitField::CoolDownTime,
            "zero",
        ),
        (
            with_limits(Mode::CooldownRequestBatch, None, None, Some((5, Duration::from_secs(1))))?,
            LimitField::RequestCount,
            "missing",
        ),
        (
            with_limits(
                Mode::DurationCooldownBatch,
                Some(3),
                Some(Duration::from_secs(1)),
                Some((5, Duration::from_secs(1))),
            )?,
            LimitField::RequestCount,
            "unexpected",
        ),
        (
            with_limits(Mode::RequestCount, Some(0), None, None)?,
            LimitField::RequestCount,
            "zero",
        ),
    ];
    for (iteration, field, kind) in cases {
        let matched = match iteration.validate() {
            Err(ValidationError::MissingLimit { field: actual, .. }) => {
                kind == "missing" && actual == field
            }
            Err(ValidationError::UnexpectedLimit { field: actual, .. }) => {
                kind == "unexpected" && actual == field
            }
            Err(ValidationError::ZeroLimit { field: actual, .. }) => kind == "zero" && actual == field,
            other => return Err(format!("{} gave {:?}", iteration.mode, other)),
        };
        if !matched {
            return Err(format!("{} did not report {} {}", iteration.mode, kind, field));
        }
    }
    Ok(())
}

#[test]
fn termination_rules_are_all_or_nothing() -> Result<(), String> {
    let mut iteration = with_limits(Mode::RequestCount, Some(1), None, None)?;
    iteration.termination_rules = vec![TerminationRule::default(), complete_rule()];
    iteration.validate().map_err(|err| err.to_string())?;

    iteration.termination_rules = vec![
        complete_rule(),
        TerminationRule {
            grace_period: Duration::ZERO,
            ..complete_rule()
        },
    ];
    match iteration.validate() {
        Err(ValidationError::HalfSpecifiedRule { index: 1, .. }) => {}
        other => return Err(format!("Expected a half specified rule, got {:?}", other)),
    }

    iteration.termination_rules = vec![TerminationRule {
        max_error_rate: -0.5,
        ..TerminationRule::default()
    }];
    match iteration.validate() {
        Err(ValidationError::HalfSpecifiedRule { index: 0, .. }) => {}
        other => return Err(format!("A negative rate alone is not a no-op, got {:?}", other)),
    }

    iteration.termination_rules = vec![TerminationRule {
        max_error_rate: 1.5,
        ..complete_rule()
    }];
    match iteration.validate() {
        Err(ValidationError::MaxErrorRateOutOfRange { index: 0, .. }) => {}
        other => return Err(format!("Expected an out of range rate, got {:?}", other)),
    }

    iteration.termination_rules = vec![TerminationRule {
        error_status_codes: vec!["StatusCode >>> 5".to_owned()],
        ..complete_rule()
    }];
    match iteration.validate() {
        Err(ValidationError::InvalidRuleFilter { index: 0, .. }) => Ok(()),
        other => Err(format!("Expected an invalid filter, got {:?}", other)),
    }
}

#[test]
fn noop_rule_needs_every_field_empty() -> Result<(), String> {
    if !TerminationRule::default().is_noop() {
        return Err("Default rule must be a no-op".to_owned());
    }
    let codes_only = TerminationRule {
        error_status_codes: vec!["StatusCode >= 500".to_owned()],
        ..TerminationRule::default()
    };
    if codes_only.is_noop() || codes_only.is_complete() {
        return Err("A rule with only codes is neither no-op nor complete".to_owned());
    }
    if !complete_rule().is_complete() {
        return Err("Fully specified rule must be complete".to_owned());
    }
    Ok(())
}

#[test]
fn status_merge_keeps_highest_severity() -> Result<(), String> {
    let cases = [
        (ExecutionStatus::NotStarted, ExecutionStatus::Ongoing, ExecutionStatus::Ongoing),
        (ExecutionStatus::Ongoing, ExecutionStatus::Success, ExecutionStatus::Success),
        (ExecutionStatus::Success, ExecutionStatus::Failed, ExecutionStatus::Failed),
        (ExecutionStatus::Failed, ExecutionStatus::Cancelled, ExecutionStatus::Cancelled),
        (ExecutionStatus::Cancelled, ExecutionStatus::Terminated, ExecutionStatus::Terminated),
        (ExecutionStatus::Terminated, ExecutionStatus::Success, ExecutionStatus::Terminated),
        (ExecutionStatus::Success, ExecutionStatus::Skipped, ExecutionStatus::Success),
        (ExecutionStatus::Skipped, ExecutionStatus::Success, ExecutionStatus::Skipped),
    ];
    for (current, incoming, expected) in cases {
        let merged = current.merge(incoming);
        if merged != expected {
            return Err(format!("{} + {} = {}, expected {}", current, incoming, merged, expected));
        }
    }
    if ExecutionStatus::Ongoing.is_terminal() || !ExecutionStatus::Skipped.is_terminal() {
        return Err("Terminal statuses start at success".to_owned());
    }
    Ok(())
}

#[test]
fn plan_structure_is_validated() -> Result<(), String> {
    let browse = Arc::new(with_limits(Mode::RequestCount, Some(1), None, None)?);
    let make_round = |name: &str, clients: usize, iterations: Vec<Arc<Iteration>>| Round {
        name: name.to_owned(),
        number_of_clients: clients,
        arrival_delay: None,
        iterations,
    };

    let valid = TestPlan {
        name: "shop".to_owned(),
        rounds: vec![make_round("peak", 2, vec![Arc::clone(&browse)])],
    };
    valid.validate().map_err(|err| err.to_string())?;

    let duplicate = TestPlan {
        name: "shop".to_owned(),
        rounds: vec![make_round("peak", 1, vec![Arc::clone(&browse), Arc::clone(&browse)])],
    };
    match duplicate.validate() {
        Err(ValidationError::DuplicateIteration { round, iteration })
            if round == "peak" && iteration == "checkout" => {}
        other => return Err(format!("Expected a duplicate iteration, got {:?}", other)),
    }

    let no_clients = TestPlan {
        name: "shop".to_owned(),
        rounds: vec![make_round("peak", 0, vec![Arc::clone(&browse)])],
    };
    match no_clients.validate() {
        Err(ValidationError::ZeroClients { .. }) => {}
        other => return Err(format!("Expected zero clients, got {:?}", other)),
    }

    let empty = TestPlan {
        name: "shop".to_owned(),
        rounds: Vec::new(),
    };
    match empty.validate() {
        Err(ValidationError::NoRounds { .. }) => Ok(()),
        other => Err(format!("Expected no rounds, got {:?}", other)),
    }
}

#[test]
fn fqdn_joins_plan_round_and_iteration() -> Result<(), String> {
    let name = fqdn("shop", "peak", "checkout");
    if name != "shop.peak.checkout" {
        return Err(format!("Unexpected fqdn: {}", name));
    }
    Ok(())
}

#[test]
fn modes_deserialize_from_short_and_long_names() -> Result<(), String> {
    let short: Mode = serde_json::from_str("\"DCB\"").map_err(|err| err.to_string())?;
    let long: Mode =
        serde_json::from_str("\"cooldown_request_batch\"").map_err(|err| err.to_string())?;
    if short != Mode::DurationCooldownBatch || long != Mode::CooldownRequestBatch {
        return Err(format!("Unexpected modes: {} / {}", short, long));
    }
    Ok(())
}
