use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::ExecutionStatus;
use crate::error::MetricsError;
use crate::rules::StatusFilterSet;

use super::emitter::MetricsEmitter;
use super::fetcher::{MetricFetcher, MetricQuery};
use super::histogram::LatencyHistogram;
use super::types::{MetricName, ResponseRecord};

const DEFAULT_RETENTION: Duration = Duration::from_secs(300);
const DEFAULT_MAX_RECORDS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseLogSettings {
    /// Records older than this are pruned on the next write.
    pub retention: Duration,
    /// Per-iteration cap; the oldest records are dropped first.
    pub max_records: usize,
}

impl Default for ResponseLogSettings {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            max_records: DEFAULT_MAX_RECORDS,
        }
    }
}

/// In-process store of recent responses, keyed by iteration fqdn.
///
/// Records arrive through [`MetricsEmitter::response_recorded`] and are
/// queried through [`MetricFetcher`], so the same log backs both telemetry
/// and termination rules. A window is dropped once no client is running its
/// iteration any more.
#[derive(Debug, Default)]
pub struct ResponseLog {
    settings: ResponseLogSettings,
    windows: DashMap<String, Mutex<VecDeque<ResponseRecord>>>,
    active: DashMap<String, u64>,
}

impl ResponseLog {
    #[must_use]
    pub fn new(settings: ResponseLogSettings) -> Self {
        Self {
            settings,
            windows: DashMap::new(),
            active: DashMap::new(),
        }
    }

    pub fn record(&self, fqdn: &str, record: ResponseRecord) {
        if let Some(window) = self.windows.get(fqdn) {
            self.push(&mut lock(window.value()), record);
            return;
        }
        let window = self.windows.entry(fqdn.to_owned()).or_default();
        self.push(&mut lock(window.value()), record);
    }

    fn push(&self, window: &mut VecDeque<ResponseRecord>, record: ResponseRecord) {
        window.push_back(record);
        if let Some(cutoff) = record.completed_at.checked_sub(self.settings.retention) {
            while window
                .front()
                .is_some_and(|oldest| oldest.completed_at < cutoff)
            {
                window.pop_front();
            }
        }
        while window.len() > self.settings.max_records {
            window.pop_front();
        }
    }

    /// Records of `fqdn` completed within the trailing `window`, oldest first.
    #[must_use]
    pub fn records(&self, fqdn: &str, window: Option<Duration>) -> Vec<ResponseRecord> {
        let Some(entry) = self.windows.get(fqdn) else {
            return Vec::new();
        };
        let records = lock(entry.value());
        let cutoff = window.and_then(|window| Instant::now().checked_sub(window));
        records
            .iter()
            .filter(|record| cutoff.is_none_or(|cutoff| record.completed_at >= cutoff))
            .copied()
            .collect()
    }

    /// Drops every record of `fqdn`.
    pub fn clear(&self, fqdn: &str) {
        self.windows.remove(fqdn);
    }

    /// Computes a metric synchronously. An empty window yields zero.
    ///
    /// # Errors
    ///
    /// Returns an error if a latency histogram cannot be built.
    pub fn compute(&self, query: &MetricQuery<'_>) -> Result<f64, MetricsError> {
        let records = self.records(query.fqdn, query.window);
        let failed = count_failed(&records, query.error_filter);
        let total = records.len();

        let value = match query.metric {
            MetricName::ErrorRate => ratio(failed, total),
            MetricName::TotalRequests => count_value(total),
            MetricName::SuccessfulRequests => count_value(total.saturating_sub(failed)),
            MetricName::FailedRequests => count_value(failed),
            MetricName::TotalTimeAverage => {
                let sum = records
                    .iter()
                    .fold(0_u64, |sum, record| sum.saturating_add(record.latency_ms()));
                let count = u64::try_from(total).unwrap_or(u64::MAX);
                sum.checked_div(count).unwrap_or(0) as f64
            }
            MetricName::TotalTimeMax => latency_histogram(&records)?.max() as f64,
            MetricName::TotalTimeP50
            | MetricName::TotalTimeP90
            | MetricName::TotalTimeP95
            | MetricName::TotalTimeP99 => {
                let quantile = query.metric.quantile().unwrap_or(1.0);
                latency_histogram(&records)?.value_at_quantile(quantile) as f64
            }
        };
        Ok(value)
    }
}

impl MetricsEmitter for ResponseLog {
    fn response_recorded(&self, fqdn: &str, record: &ResponseRecord) {
        self.record(fqdn, *record);
    }

    fn iteration_started(&self, fqdn: &str) {
        let mut running = self.active.entry(fqdn.to_owned()).or_default();
        *running = running.saturating_add(1);
    }

    fn iteration_finished(&self, fqdn: &str, _status: ExecutionStatus, _dispatched: u64) {
        if let Some(mut running) = self.active.get_mut(fqdn) {
            *running = running.saturating_sub(1);
        }
        if self
            .active
            .remove_if(fqdn, |_, running| *running == 0)
            .is_some()
        {
            self.clear(fqdn);
        }
    }
}

#[async_trait]
impl MetricFetcher for ResponseLog {
    async fn metric_value(
        &self,
        query: &MetricQuery<'_>,
        cancel: &CancellationToken,
    ) -> Result<f64, MetricsError> {
        if cancel.is_cancelled() {
            return Err(MetricsError::Cancelled {
                fqdn: query.fqdn.to_owned(),
            });
        }
        self.compute(query)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An explicit filter alone decides what counts as an error. Without one,
/// transport failures count alongside the default error statuses.
fn count_failed(records: &[ResponseRecord], error_filter: Option<&StatusFilterSet>) -> usize {
    error_filter.map_or_else(
        || {
            let default_filter = StatusFilterSet::default_errors();
            records
                .iter()
                .filter(|record| {
                    record.transport_error || default_filter.matches(record.status_code)
                })
                .count()
        },
        |filter| {
            records
                .iter()
                .filter(|record| filter.matches(record.status_code))
                .count()
        },
    )
}

fn latency_histogram(records: &[ResponseRecord]) -> Result<LatencyHistogram, MetricsError> {
    let mut histogram = LatencyHistogram::new()?;
    for record in records {
        histogram.record(record.latency_ms())?;
    }
    Ok(histogram)
}

fn count_value(count: usize) -> f64 {
    count as f64
}

#[expect(
    clippy::float_arithmetic,
    reason = "error rate is a ratio of two counts"
)]
fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count_value(part) / count_value(total)
}
