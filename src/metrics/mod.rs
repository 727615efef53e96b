//! Response records, the in-process metric store and telemetry emitters.
mod emitter;
mod fetcher;
mod histogram;
mod response_log;
mod types;


pub use emitter::{FanoutEmitter, MetricsEmitter, NoopEmitter, TracingEmitter};
pub use fetcher::{MetricFetcher, MetricQuery};
pub use histogram::LatencyHistogram;
pub use response_log::{ResponseLog, ResponseLogSettings};
pub use types::{MetricName, ResponseRecord, TRANSPORT_ERROR_STATUS};
