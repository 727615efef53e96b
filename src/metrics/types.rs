use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::RulesError;

/// Status recorded for requests that never produced an HTTP response.
pub const TRANSPORT_ERROR_STATUS: u16 = 500;

/// Outcome of one request as seen by the metric store.
#[derive(Clone, Copy, Debug)]
pub struct ResponseRecord {
    pub completed_at: Instant,
    pub latency: Duration,
    pub status_code: u16,
    pub transport_error: bool,
}

impl ResponseRecord {
    #[must_use]
    pub fn new(start: Instant, status_code: u16, transport_error: bool) -> Self {
        let completed_at = Instant::now();
        Self {
            completed_at,
            latency: completed_at.saturating_duration_since(start),
            status_code,
            transport_error,
        }
    }

    #[must_use]
    pub fn transport_failure(start: Instant) -> Self {
        Self::new(start, TRANSPORT_ERROR_STATUS, true)
    }

    #[must_use]
    pub fn latency_ms(&self) -> u64 {
        u64::try_from(self.latency.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Metrics the response log can compute for an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricName {
    ErrorRate,
    TotalRequests,
    SuccessfulRequests,
    FailedRequests,
    TotalTimeAverage,
    TotalTimeP50,
    TotalTimeP90,
    TotalTimeP95,
    TotalTimeP99,
    TotalTimeMax,
}

impl MetricName {
    pub const ALL: [MetricName; 10] = [
        MetricName::ErrorRate,
        MetricName::TotalRequests,
        MetricName::SuccessfulRequests,
        MetricName::FailedRequests,
        MetricName::TotalTimeAverage,
        MetricName::TotalTimeP50,
        MetricName::TotalTimeP90,
        MetricName::TotalTimeP95,
        MetricName::TotalTimeP99,
        MetricName::TotalTimeMax,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MetricName::ErrorRate => "ErrorRate",
            MetricName::TotalRequests => "TotalRequests",
            MetricName::SuccessfulRequests => "SuccessfulRequests",
            MetricName::FailedRequests => "FailedRequests",
            MetricName::TotalTimeAverage => "TotalTime.Average",
            MetricName::TotalTimeP50 => "TotalTime.P50",
            MetricName::TotalTimeP90 => "TotalTime.P90",
            MetricName::TotalTimeP95 => "TotalTime.P95",
            MetricName::TotalTimeP99 => "TotalTime.P99",
            MetricName::TotalTimeMax => "TotalTime.Max",
        }
    }

    pub(crate) const fn quantile(self) -> Option<f64> {
        match self {
            MetricName::TotalTimeP50 => Some(0.5),
            MetricName::TotalTimeP90 => Some(0.9),
            MetricName::TotalTimeP95 => Some(0.95),
            MetricName::TotalTimeP99 => Some(0.99),
            MetricName::ErrorRate
            | MetricName::TotalRequests
            | MetricName::SuccessfulRequests
            | MetricName::FailedRequests
            | MetricName::TotalTimeAverage
            | MetricName::TotalTimeMax => None,
        }
    }
}

impl FromStr for MetricName {
    type Err = RulesError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        MetricName::ALL
            .into_iter()
            .find(|metric| metric.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| RulesError::UnknownMetric {
                metric: value.to_owned(),
            })
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
