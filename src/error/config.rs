use std::path::PathBuf;

use thiserror::Error;

use super::{RulesError, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to parse JSON config '{path}': {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unsupported config extension '{ext}'. Use .toml or .json.")]
    UnsupportedExtension { ext: String },
    #[error("Config file must have .toml or .json extension.")]
    MissingExtension,
    #[error("No config given and neither volley.toml nor volley.json exists.")]
    NotFound,
    #[error("Invalid duration for '{field}': {source}")]
    InvalidDuration {
        field: &'static str,
        #[source]
        source: ValidationError,
    },
    #[error("Invalid header '{value}'. Expected 'Key: Value'.")]
    InvalidHeader { value: String },
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("URL '{url}' has no host.")]
    UrlWithoutHost { url: String },
    #[error("Session step '{step}' needs a url, or a path with a session base_url.")]
    MissingStepUrl { step: String },
    #[error("Invalid error_status_codes for iteration '{iteration}': {source}")]
    InvalidStatusFilter {
        iteration: String,
        #[source]
        source: RulesError,
    },
    #[error("Watchdog '{cool_down}' must not exceed '{max}'.")]
    WatchdogThresholds {
        cool_down: &'static str,
        max: &'static str,
    },
}
