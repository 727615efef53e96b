use hdrhistogram::Histogram;

use crate::error::MetricsError;

/// Millisecond latency histogram with three significant digits.
#[derive(Debug)]
pub struct LatencyHistogram {
    hist: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create an empty histogram.
    ///
    /// # Errors
    ///
    /// Returns an error if the histogram cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let hist = Histogram::<u64>::new(3)
            .map_err(|source| MetricsError::HistogramCreate { source })?;
        Ok(Self { hist })
    }

    /// Record a latency value in milliseconds. Zero is recorded as one.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be recorded.
    pub fn record(&mut self, latency_ms: u64) -> Result<(), MetricsError> {
        self.hist
            .record(latency_ms.max(1))
            .map_err(|source| MetricsError::HistogramRecord { source })
    }

    #[must_use]
    pub fn value_at_quantile(&self, quantile: f64) -> u64 {
        if self.hist.is_empty() {
            return 0;
        }
        self.hist.value_at_quantile(quantile)
    }

    #[must_use]
    pub fn max(&self) -> u64 {
        if self.hist.is_empty() {
            return 0;
        }
        self.hist.max()
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.hist.len()
    }
}
