mod admission;
mod app;
mod config;
mod http;
mod metrics;
mod rules;
mod validation;

pub use admission::AdmissionError;
pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use http::HttpError;
pub use metrics::MetricsError;
pub use rules::RulesError;
pub use validation::{LimitField, ValidationError};
