use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to create histogram: {source}")]
    HistogramCreate {
        #[source]
        source: hdrhistogram::CreationError,
    },
    #[error("Failed to record latency: {source}")]
    HistogramRecord {
        #[source]
        source: hdrhistogram::RecordError,
    },
    #[error("Metric lookup for '{fqdn}' was cancelled.")]
    Cancelled { fqdn: String },
}
