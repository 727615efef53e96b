use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::MetricsError;
use crate::rules::StatusFilterSet;

use super::types::MetricName;

/// A metric lookup for one iteration.
#[derive(Debug, Clone, Copy)]
pub struct MetricQuery<'query> {
    pub fqdn: &'query str,
    pub metric: MetricName,
    /// Trailing window; `None` covers everything still retained.
    pub window: Option<Duration>,
    /// Which statuses count as errors; `None` uses `StatusCode >= 400`.
    pub error_filter: Option<&'query StatusFilterSet>,
}

impl<'query> MetricQuery<'query> {
    #[must_use]
    pub const fn new(fqdn: &'query str, metric: MetricName) -> Self {
        Self {
            fqdn,
            metric,
            window: None,
            error_filter: None,
        }
    }

    #[must_use]
    pub const fn within(mut self, window: Duration) -> Self {
        self.window = Some(window);
        self
    }

    #[must_use]
    pub const fn with_error_filter(mut self, filter: &'query StatusFilterSet) -> Self {
        self.error_filter = Some(filter);
        self
    }
}

#[async_trait]
pub trait MetricFetcher: Send + Sync {
    /// Computes `query.metric` for the iteration.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot answer the query.
    async fn metric_value(
        &self,
        query: &MetricQuery<'_>,
        cancel: &CancellationToken,
    ) -> Result<f64, MetricsError>;
}
