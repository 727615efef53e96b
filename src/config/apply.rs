use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::admission::WatchdogConfig;
use crate::domain::{
    Iteration, Round, SessionSpec, SessionStep, TerminationRule, TestPlan, UnitSpec,
};
use crate::error::{AppError, AppResult, ConfigError, ValidationError};
use crate::http::{ClientSettings, RequestSpec};
use crate::metrics::ResponseLogSettings;
use crate::rules::StatusFilterSet;

use super::types::{
    ClientSection, ConfigFile, DurationValue, IterationConfig, MetricsSection, RequestConfig,
    RoundConfig, SessionConfig, SessionStepConfig, TerminationRuleConfig, WatchdogSection,
};

/// Everything needed to run a plan, resolved from a config file.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub plan: TestPlan,
    pub watchdog: WatchdogConfig,
    pub client: ClientSettings,
    pub response_log: ResponseLogSettings,
}

/// Resolves a parsed config file into runtime settings.
///
/// Iteration limits are not checked here; see [`Iteration::validate`].
///
/// # Errors
///
/// Returns an error for malformed durations, URLs, headers or status
/// filters, or for inverted watchdog thresholds.
pub fn apply_config(config: &ConfigFile) -> AppResult<RunConfig> {
    let rounds = config
        .plan
        .rounds
        .iter()
        .map(build_round)
        .collect::<AppResult<Vec<_>>>()?;
    let plan = TestPlan {
        name: config.plan.name.clone(),
        rounds,
    };
    let watchdog = build_watchdog(config.watchdog.as_ref())?;
    let client = build_client(config.client.as_ref())?;
    let response_log = build_response_log(config.metrics.as_ref(), &plan)?;
    Ok(RunConfig {
        plan,
        watchdog,
        client,
        response_log,
    })
}

fn build_round(round: &RoundConfig) -> AppResult<Round> {
    let iterations = round
        .iterations
        .iter()
        .map(|iteration| build_iteration(iteration).map(Arc::new))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Round {
        name: round.name.clone(),
        number_of_clients: round.clients,
        arrival_delay: optional_duration(round.arrival_delay.as_ref(), "arrival_delay")?,
        iterations,
    })
}

fn build_iteration(iteration: &IterationConfig) -> AppResult<Iteration> {
    let error_status_codes = match iteration.error_status_codes.as_deref() {
        Some(codes) if !codes.is_empty() => StatusFilterSet::parse(codes).map_err(|source| {
            AppError::config(ConfigError::InvalidStatusFilter {
                iteration: iteration.name.clone(),
                source,
            })
        })?,
        _ => StatusFilterSet::default_errors(),
    };
    let termination_rules = iteration
        .termination_rules
        .iter()
        .map(build_rule)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Iteration {
        name: iteration.name.clone(),
        mode: iteration.mode,
        request_count: iteration.request_count,
        duration: optional_duration(iteration.duration.as_ref(), "duration")?,
        batch_size: iteration.batch_size,
        cool_down_time: optional_duration(iteration.cool_down_time.as_ref(), "cool_down_time")?,
        maximize_throughput: iteration.maximize_throughput,
        termination_rules,
        error_status_codes,
        startup_delay: optional_duration(iteration.startup_delay.as_ref(), "startup_delay")?,
        unit: build_unit_spec(iteration)?,
    })
}

fn build_rule(rule: &TerminationRuleConfig) -> AppResult<TerminationRule> {
    Ok(TerminationRule {
        error_status_codes: rule.error_status_codes.clone(),
        max_error_rate: rule.max_error_rate,
        grace_period: optional_duration(rule.grace_period.as_ref(), "grace_period")?
            .unwrap_or(Duration::ZERO),
    })
}

fn build_unit_spec(iteration: &IterationConfig) -> AppResult<UnitSpec> {
    match (&iteration.request, &iteration.session) {
        (Some(request), None) => Ok(UnitSpec::Request(build_request(request)?)),
        (None, Some(session)) => Ok(UnitSpec::Session(build_session(session)?)),
        (Some(_), Some(_)) => Err(AppError::validation(
            ValidationError::ConflictingDispatchUnit {
                iteration: iteration.name.clone(),
            },
        )),
        (None, None) => Err(AppError::validation(ValidationError::MissingDispatchUnit {
            iteration: iteration.name.clone(),
        })),
    }
}

fn build_request(request: &RequestConfig) -> AppResult<RequestSpec> {
    Ok(RequestSpec {
        method: request.method,
        url: parse_url(&request.url)?,
        headers: parse_headers(&request.headers)?,
        body: request.body.clone(),
    })
}

fn build_session(session: &SessionConfig) -> AppResult<SessionSpec> {
    let base_url = session.base_url.as_deref().map(parse_url).transpose()?;
    let shared_headers = parse_headers(&session.headers)?;
    let steps = session
        .steps
        .iter()
        .map(|step| build_step(step, base_url.as_ref(), &shared_headers))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(SessionSpec { steps })
}

fn build_step(
    step: &SessionStepConfig,
    base_url: Option<&Url>,
    shared_headers: &[(String, String)],
) -> AppResult<SessionStep> {
    let url = match (step.url.as_deref(), step.path.as_deref(), base_url) {
        (Some(url), _, _) => parse_url(url)?,
        (None, Some(path), Some(base)) => {
            let joined = base.join(path).map_err(|source| {
                AppError::config(ConfigError::InvalidUrl {
                    url: path.to_owned(),
                    source,
                })
            })?;
            ensure_host(joined)?
        }
        (None, Some(path), None) => parse_url(path)?,
        (None, None, Some(base)) => base.clone(),
        (None, None, None) => {
            return Err(AppError::config(ConfigError::MissingStepUrl {
                step: step.name.clone().unwrap_or_default(),
            }));
        }
    };
    let mut headers = shared_headers.to_vec();
    headers.extend(parse_headers(&step.headers)?);
    Ok(SessionStep {
        name: step.name.clone(),
        request: RequestSpec {
            method: step.method,
            url,
            headers,
            body: step.body.clone(),
        },
        think_time: optional_duration(step.think_time.as_ref(), "think_time")?,
    })
}

fn build_watchdog(section: Option<&WatchdogSection>) -> AppResult<WatchdogConfig> {
    let defaults = WatchdogConfig::default();
    let Some(section) = section else {
        return Ok(defaults);
    };
    let config = WatchdogConfig {
        max_memory_mb: section.max_memory_mb.unwrap_or(defaults.max_memory_mb),
        max_cpu_percentage: section
            .max_cpu_percentage
            .unwrap_or(defaults.max_cpu_percentage),
        max_connections_per_host: section
            .max_connections_per_host
            .unwrap_or(defaults.max_connections_per_host),
        cool_down_memory_mb: section
            .cool_down_memory_mb
            .unwrap_or(defaults.cool_down_memory_mb),
        cool_down_cpu_percentage: section
            .cool_down_cpu_percentage
            .unwrap_or(defaults.cool_down_cpu_percentage),
        cool_down_connections_per_host: section
            .cool_down_connections_per_host
            .unwrap_or(defaults.cool_down_connections_per_host),
        cool_down_retry_time: positive_duration(
            section.cool_down_retry_time.as_ref(),
            "cool_down_retry_time",
        )?
        .unwrap_or(defaults.cool_down_retry_time),
        max_cooling_period: positive_duration(
            section.max_cooling_period.as_ref(),
            "max_cooling_period",
        )?
        .unwrap_or(defaults.max_cooling_period),
        resume_cooling_after: positive_duration(
            section.resume_cooling_after.as_ref(),
            "resume_cooling_after",
        )?
        .unwrap_or(defaults.resume_cooling_after),
        suspension_mode: section.suspension_mode.unwrap_or(defaults.suspension_mode),
    };
    if let Some((cool_down, max)) = config.inverted_thresholds() {
        return Err(AppError::config(ConfigError::WatchdogThresholds {
            cool_down,
            max,
        }));
    }
    Ok(config)
}

fn build_client(section: Option<&ClientSection>) -> AppResult<ClientSettings> {
    let mut settings = ClientSettings::default();
    let Some(section) = section else {
        return Ok(settings);
    };
    if let Some(timeout) = positive_duration(section.timeout.as_ref(), "timeout")? {
        settings.request_timeout = timeout;
    }
    if let Some(timeout) = positive_duration(section.connect_timeout.as_ref(), "connect_timeout")?
    {
        settings.connect_timeout = timeout;
    }
    settings.pool_max_idle_per_host = section.pool_max_idle_per_host;
    settings.disable_keepalive = section.disable_keepalive.unwrap_or(false);
    settings.insecure = section.insecure.unwrap_or(false);
    if let Some(user_agent) = &section.user_agent {
        settings.user_agent = (!user_agent.is_empty()).then(|| user_agent.clone());
    }
    Ok(settings)
}

/// Retention never drops below the longest grace period in the plan.
fn build_response_log(
    section: Option<&MetricsSection>,
    plan: &TestPlan,
) -> AppResult<ResponseLogSettings> {
    let mut settings = ResponseLogSettings::default();
    if let Some(section) = section {
        if let Some(retention) = positive_duration(section.retention.as_ref(), "retention")? {
            settings.retention = retention;
        }
        if let Some(max_records) = section.max_records.filter(|max| *max > 0) {
            settings.max_records = max_records;
        }
    }
    let longest_grace = plan
        .rounds
        .iter()
        .flat_map(|round| round.iterations.iter())
        .flat_map(|iteration| iteration.termination_rules.iter())
        .map(|rule| rule.grace_period)
        .max()
        .unwrap_or(Duration::ZERO);
    settings.retention = settings.retention.max(longest_grace);
    Ok(settings)
}

fn optional_duration(
    value: Option<&DurationValue>,
    field: &'static str,
) -> AppResult<Option<Duration>> {
    value
        .map(|value| {
            value.to_duration().map_err(|source| {
                AppError::config(ConfigError::InvalidDuration { field, source })
            })
        })
        .transpose()
}

fn positive_duration(
    value: Option<&DurationValue>,
    field: &'static str,
) -> AppResult<Option<Duration>> {
    value
        .map(|value| {
            value.to_positive_duration().map_err(|source| {
                AppError::config(ConfigError::InvalidDuration { field, source })
            })
        })
        .transpose()
}

fn parse_url(raw: &str) -> AppResult<Url> {
    let url = Url::parse(raw).map_err(|source| {
        AppError::config(ConfigError::InvalidUrl {
            url: raw.to_owned(),
            source,
        })
    })?;
    ensure_host(url)
}

fn ensure_host(url: Url) -> AppResult<Url> {
    if url.host_str().is_none_or(str::is_empty) {
        return Err(AppError::config(ConfigError::UrlWithoutHost {
            url: url.to_string(),
        }));
    }
    Ok(url)
}

fn parse_headers(headers: &[String]) -> AppResult<Vec<(String, String)>> {
    headers
        .iter()
        .map(|header| match header.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_owned(), value.trim().to_owned()))
            }
            _ => Err(AppError::config(ConfigError::InvalidHeader {
                value: header.clone(),
            })),
        })
        .collect()
}
