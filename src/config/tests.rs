use std::time::Duration;

use tempfile::tempdir;

use crate::admission::SuspensionMode;
use crate::domain::{BatchPlan, ModePlan, UnitSpec};
use crate::error::{AppError, ConfigError, ValidationError};
use crate::http::HttpMethod;

use super::types::ConfigFile;
use super::{RunConfig, apply_config, load_config_file, parse_duration_value};

const FULL_TOML: &str = r#"
[plan]
name = "shop"

[[plan.rounds]]
name = "warmup"
clients = 2
arrival_delay = "500ms"

[[plan.rounds.iterations]]
name = "browse"
mode = "CRB"
request_count = 25
batch_size = 10
cool_down_time = "2s"
maximize_throughput = true
error_status_codes = ["StatusCode >= 500"]

[plan.rounds.iterations.request]
method = "post"
url = "http://shop.test/cart"
headers = ["Content-Type: application/json"]
data = "{}"

[[plan.rounds.iterations.termination_rules]]
error_status_codes = ["StatusCode between 500 and 599"]
max_error_rate = 0.2
grace_period = "10m"

[watchdog]
max_memory_mb = 4096
cool_down_memory_mb = 3000
suspension_mode = "all"

[client]
timeout = "3s"
user_agent = ""

[metrics]
retention = 60
max_records = 500
"#;

const SESSION_JSON: &str = r#"{
  "plan": {
    "name": "shop",
    "rounds": [{
      "name": "journey",
      "number_of_clients": 1,
      "iterations": [{
        "name": "checkout",
        "mode": "R",
        "request_count": 2,
        "session": {
          "base_url": "https://shop.test/api/",
          "headers": ["Authorization: Bearer token"],
          "steps": [
            {"name": "login", "method": "post", "path": "login", "data": "{}", "think_time": "250ms"},
            {"name": "cart", "path": "cart", "headers": ["X-Step: cart"]},
            {"name": "health", "url": "https://status.shop.test/ping"}
          ]
        }
      }]
    }]
  }
}"#;

fn load(name: &str, content: &str) -> Result<RunConfig, String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join(name);
    std::fs::write(&path, content).map_err(|err| format!("write failed: {}", err))?;
    let file = load_config_file(&path).map_err(|err| format!("load failed: {}", err))?;
    apply_config(&file).map_err(|err| format!("apply failed: {}", err))
}

/// A single-iteration plan whose iteration body is `iteration`, followed by
/// any extra top-level `sections`.
fn plan_with(iteration: &str, sections: &str) -> Result<ConfigFile, String> {
    let content = format!(
        "[plan]\nname = \"shop\"\n\n[[plan.rounds]]\nname = \"peak\"\n\n[[plan.rounds.iterations]]\nname = \"browse\"\nmode = \"R\"\nrequest_count = 1\n{}\n{}",
        iteration, sections
    );
    toml::from_str(&content).map_err(|err| format!("parse failed: {}", err))
}

const REQUEST: &str = "[plan.rounds.iterations.request]\nurl = \"http://shop.test/\"\n";

#[test]
fn toml_plan_resolves_every_section() -> Result<(), String> {
    let config = load("volley.toml", FULL_TOML)?;

    let round = config
        .plan
        .rounds
        .first()
        .ok_or_else(|| "Missing round".to_owned())?;
    if round.number_of_clients != 2 || round.arrival_delay != Some(Duration::from_millis(500)) {
        return Err(format!("Unexpected round: {:?}", round));
    }
    let iteration = round
        .iterations
        .first()
        .ok_or_else(|| "Missing iteration".to_owned())?;
    let plan = iteration.validate().map_err(|err| err.to_string())?;
    let expected = ModePlan::CooldownRequestBatch {
        request_count: 25,
        batch: BatchPlan {
            batch_size: 10,
            cool_down: Duration::from_secs(2),
            maximize_throughput: true,
        },
    };
    if plan != expected {
        return Err(format!("Unexpected mode plan: {:?}", plan));
    }
    if !iteration.error_status_codes.matches(503) || iteration.error_status_codes.matches(404) {
        return Err("Iteration error filter not applied".to_owned());
    }
    match &iteration.unit {
        UnitSpec::Request(request)
            if request.method == HttpMethod::Post
                && request.url.as_str() == "http://shop.test/cart"
                && request.headers == vec![("Content-Type".to_owned(), "application/json".to_owned())]
                && request.body.as_deref() == Some("{}") => {}
        other => return Err(format!("Unexpected unit: {:?}", other)),
    }
    let grace = iteration
        .termination_rules
        .first()
        .map(|rule| rule.grace_period);
    if grace != Some(Duration::from_secs(600)) {
        return Err(format!("Unexpected grace period: {:?}", grace));
    }

    if config.watchdog.max_memory_mb != 4096
        || config.watchdog.cool_down_memory_mb != 3000
        || config.watchdog.max_connections_per_host != 1000
        || config.watchdog.suspension_mode != SuspensionMode::All
    {
        return Err(format!("Unexpected watchdog: {:?}", config.watchdog));
    }
    if config.client.request_timeout != Duration::from_secs(3) || config.client.user_agent.is_some() {
        return Err(format!("Unexpected client: {:?}", config.client));
    }
    // Retention is raised to the longest grace period.
    if config.response_log.retention != Duration::from_secs(600)
        || config.response_log.max_records != 500
    {
        return Err(format!("Unexpected response log: {:?}", config.response_log));
    }
    Ok(())
}

#[test]
fn json_session_joins_paths_and_merges_headers() -> Result<(), String> {
    let config = load("volley.json", SESSION_JSON)?;
    let iteration = config
        .plan
        .rounds
        .first()
        .and_then(|round| round.iterations.first())
        .ok_or_else(|| "Missing iteration".to_owned())?;
    let UnitSpec::Session(session) = &iteration.unit else {
        return Err(format!("Expected a session, got {:?}", iteration.unit));
    };
    let urls: Vec<&str> = session
        .steps
        .iter()
        .map(|step| step.request.url.as_str())
        .collect();
    let expected = [
        "https://shop.test/api/login",
        "https://shop.test/api/cart",
        "https://status.shop.test/ping",
    ];
    if urls != expected {
        return Err(format!("Unexpected step urls: {:?}", urls));
    }
    match session.steps.as_slice() {
        [login, cart, _]
            if login.request.method == HttpMethod::Post
                && login.request.body.as_deref() == Some("{}")
                && login.think_time == Some(Duration::from_millis(250))
                && cart.request.headers
                    == vec![
                        ("Authorization".to_owned(), "Bearer token".to_owned()),
                        ("X-Step".to_owned(), "cart".to_owned()),
                    ] => {}
        other => return Err(format!("Unexpected steps: {:?}", other)),
    }
    if iteration.unit.target_host() != "shop.test" {
        return Err(format!("Unexpected target host: {}", iteration.unit.target_host()));
    }
    Ok(())
}

#[test]
fn parses_duration_units() -> Result<(), String> {
    let cases = [
        ("250ms", Duration::from_millis(250)),
        ("3s", Duration::from_secs(3)),
        ("2m", Duration::from_secs(120)),
        ("1h", Duration::from_secs(3_600)),
        ("15", Duration::from_secs(15)),
        ("0", Duration::ZERO),
    ];
    for (input, expected) in cases {
        let parsed = parse_duration_value(input).map_err(|err| format!("{}: {}", input, err))?;
        if parsed != expected {
            return Err(format!("{} parsed as {:?}", input, parsed));
        }
    }
    let failures: [(&str, fn(&ValidationError) -> bool); 3] = [
        ("", |err| matches!(err, ValidationError::DurationEmpty)),
        ("soon", |err| matches!(err, ValidationError::InvalidDurationFormat { .. })),
        ("5d", |err| matches!(err, ValidationError::InvalidDurationUnit { .. })),
    ];
    for (input, expected) in failures {
        match parse_duration_value(input) {
            Err(err) if expected(&err) => {}
            other => return Err(format!("'{}' gave {:?}", input, other)),
        }
    }
    Ok(())
}

#[test]
fn unknown_fields_are_rejected() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("volley.toml");
    std::fs::write(&path, "[plan]\nname = \"shop\"\nrate = 10\n")
        .map_err(|err| format!("write failed: {}", err))?;
    match load_config_file(&path) {
        Err(AppError::Config(ConfigError::ParseToml { .. })) => Ok(()),
        other => Err(format!("Expected a TOML error, got {:?}", other)),
    }
}

#[test]
fn unsupported_extension_is_rejected() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("volley.yaml");
    std::fs::write(&path, "plan: {}\n").map_err(|err| format!("write failed: {}", err))?;
    match load_config_file(&path) {
        Err(AppError::Config(ConfigError::UnsupportedExtension { ext })) if ext == "yaml" => Ok(()),
        other => Err(format!("Expected UnsupportedExtension, got {:?}", other)),
    }
}

#[test]
fn iteration_needs_exactly_one_dispatch_unit() -> Result<(), String> {
    let missing = plan_with("", "")?;
    match apply_config(&missing) {
        Err(AppError::Validation(ValidationError::MissingDispatchUnit { iteration }))
            if iteration == "browse" => {}
        other => return Err(format!("Expected MissingDispatchUnit, got {:?}", other)),
    }

    let both = plan_with(
        REQUEST,
        "[plan.rounds.iterations.session]\nbase_url = \"http://shop.test/\"\n",
    )?;
    match apply_config(&both) {
        Err(AppError::Validation(ValidationError::ConflictingDispatchUnit { .. })) => Ok(()),
        other => Err(format!("Expected ConflictingDispatchUnit, got {:?}", other)),
    }
}

#[test]
fn malformed_request_fields_are_config_errors() -> Result<(), String> {
    let bad_header = plan_with(
        "[plan.rounds.iterations.request]\nurl = \"http://shop.test/\"\nheaders = [\"no-colon\"]\n",
        "",
    )?;
    match apply_config(&bad_header) {
        Err(AppError::Config(ConfigError::InvalidHeader { value })) if value == "no-colon" => {}
        other => return Err(format!("Expected InvalidHeader, got {:?}", other)),
    }

    let no_host = plan_with(
        "[plan.rounds.iterations.request]\nurl = \"file:///tmp/data\"\n",
        "",
    )?;
    match apply_config(&no_host) {
        Err(AppError::Config(ConfigError::UrlWithoutHost { .. })) => {}
        other => return Err(format!("Expected UrlWithoutHost, got {:?}", other)),
    }

    let bad_filter = plan_with(
        "error_status_codes = [\"Latency > 5\"]\n[plan.rounds.iterations.request]\nurl = \"http://shop.test/\"\n",
        "",
    )?;
    match apply_config(&bad_filter) {
        Err(AppError::Config(ConfigError::InvalidStatusFilter { .. })) => Ok(()),
        other => Err(format!("Expected InvalidStatusFilter, got {:?}", other)),
    }
}

#[test]
fn session_step_without_url_or_base_is_rejected() -> Result<(), String> {
    let config = plan_with(
        "[plan.rounds.iterations.session]\n[[plan.rounds.iterations.session.steps]]\nname = \"orphan\"\n",
        "",
    )?;
    match apply_config(&config) {
        Err(AppError::Config(ConfigError::MissingStepUrl { step })) if step == "orphan" => Ok(()),
        other => Err(format!("Expected MissingStepUrl, got {:?}", other)),
    }
}

#[test]
fn watchdog_thresholds_must_not_be_inverted() -> Result<(), String> {
    let config = plan_with(REQUEST, "[watchdog]\nmax_cpu_percentage = 50.0\n")?;
    match apply_config(&config) {
        Err(AppError::Config(ConfigError::WatchdogThresholds { cool_down, max }))
            if cool_down == "cool_down_cpu_percentage" && max == "max_cpu_percentage" => {}
        other => return Err(format!("Expected WatchdogThresholds, got {:?}", other)),
    }

    let zero_retry = plan_with(REQUEST, "[watchdog]\ncool_down_retry_time = 0\n")?;
    match apply_config(&zero_retry) {
        Err(AppError::Config(ConfigError::InvalidDuration { field, .. }))
            if field == "cool_down_retry_time" =>
        {
            Ok(())
        }
        other => Err(format!("Expected InvalidDuration, got {:?}", other)),
    }
}

#[test]
fn invalid_limits_survive_loading_and_fail_validation() -> Result<(), String> {
    let config = plan_with(&format!("batch_size = 5\n{}", REQUEST), "")?;
    let run_config = apply_config(&config).map_err(|err| err.to_string())?;
    let invalid = run_config.plan.invalid_iterations();
    match invalid.as_slice() {
        [(round, iteration, ValidationError::UnexpectedLimit { .. })]
            if round == "peak" && iteration == "browse" =>
        {
            Ok(())
        }
        other => Err(format!("Expected one invalid iteration, got {:?}", other)),
    }
}
