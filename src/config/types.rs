use std::time::Duration;

use serde::Deserialize;

use crate::admission::SuspensionMode;
use crate::domain::Mode;
use crate::error::ValidationError;
use crate::http::HttpMethod;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub plan: PlanConfig,
    pub watchdog: Option<WatchdogSection>,
    pub client: Option<ClientSection>,
    pub metrics: Option<MetricsSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanConfig {
    pub name: String,
    #[serde(default)]
    pub rounds: Vec<RoundConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoundConfig {
    pub name: String,
    #[serde(default = "default_clients", alias = "number_of_clients")]
    pub clients: usize,
    pub arrival_delay: Option<DurationValue>,
    #[serde(default)]
    pub iterations: Vec<IterationConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IterationConfig {
    pub name: String,
    pub mode: Mode,
    pub request_count: Option<u64>,
    pub duration: Option<DurationValue>,
    pub batch_size: Option<u64>,
    pub cool_down_time: Option<DurationValue>,
    #[serde(default)]
    pub maximize_throughput: bool,
    pub startup_delay: Option<DurationValue>,
    pub error_status_codes: Option<Vec<String>>,
    #[serde(default)]
    pub termination_rules: Vec<TerminationRuleConfig>,
    pub request: Option<RequestConfig>,
    pub session: Option<SessionConfig>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TerminationRuleConfig {
    #[serde(default)]
    pub error_status_codes: Vec<String>,
    #[serde(default)]
    pub max_error_rate: f64,
    pub grace_period: Option<DurationValue>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RequestConfig {
    #[serde(default)]
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(alias = "data")]
    pub body: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    pub base_url: Option<String>,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub steps: Vec<SessionStepConfig>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SessionStepConfig {
    pub name: Option<String>,
    #[serde(default)]
    pub method: HttpMethod,
    pub url: Option<String>,
    pub path: Option<String>,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(alias = "data")]
    pub body: Option<String>,
    pub think_time: Option<DurationValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchdogSection {
    pub max_memory_mb: Option<u64>,
    pub max_cpu_percentage: Option<f64>,
    pub max_connections_per_host: Option<u64>,
    pub cool_down_memory_mb: Option<u64>,
    pub cool_down_cpu_percentage: Option<f64>,
    pub cool_down_connections_per_host: Option<u64>,
    pub cool_down_retry_time: Option<DurationValue>,
    pub max_cooling_period: Option<DurationValue>,
    pub resume_cooling_after: Option<DurationValue>,
    pub suspension_mode: Option<SuspensionMode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    pub timeout: Option<DurationValue>,
    pub connect_timeout: Option<DurationValue>,
    pub pool_max_idle_per_host: Option<usize>,
    pub disable_keepalive: Option<bool>,
    pub insecure: Option<bool>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    pub retention: Option<DurationValue>,
    pub max_records: Option<usize>,
}

const fn default_clients() -> usize {
    1
}

/// A duration given either as whole seconds or as text such as `"250ms"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationValue::Text(text) => super::parse_duration_value(text),
        }
    }

    pub(crate) fn to_positive_duration(&self) -> Result<Duration, ValidationError> {
        let duration = self.to_duration()?;
        if duration.is_zero() {
            return Err(ValidationError::DurationZero);
        }
        Ok(duration)
    }
}
