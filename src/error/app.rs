use thiserror::Error;

use crate::domain::ExecutionStatus;

use super::{AdmissionError, ConfigError, HttpError, MetricsError, RulesError, ValidationError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("CLI error: {source}")]
    Clap {
        #[from]
        source: clap::Error,
    },
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("Join error: {source}")]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),
    #[error("Rules error: {0}")]
    Rules(#[from] RulesError),
    #[error("Admission error: {0}")]
    Admission(#[from] AdmissionError),
    #[error("Plan '{plan}' had failed iterations (final status {status}).")]
    RunFailed {
        plan: String,
        status: ExecutionStatus,
    },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation<E>(error: E) -> Self
    where
        E: Into<ValidationError>,
    {
        error.into().into()
    }

    pub fn config<E>(error: E) -> Self
    where
        E: Into<ConfigError>,
    {
        error.into().into()
    }

    pub fn http<E>(error: E) -> Self
    where
        E: Into<HttpError>,
    {
        error.into().into()
    }

    pub fn rules<E>(error: E) -> Self
    where
        E: Into<RulesError>,
    {
        error.into().into()
    }

    pub fn admission<E>(error: E) -> Self
    where
        E: Into<AdmissionError>,
    {
        error.into().into()
    }
}
