use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppError, AppResult, ConfigError};

use super::types::ConfigFile;

const DEFAULT_TOML: &str = "volley.toml";
const DEFAULT_JSON: &str = "volley.json";

/// Loads the plan from `path`, or from `volley.toml` / `volley.json` in the
/// working directory.
///
/// # Errors
///
/// Returns an error when no config exists or it cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> AppResult<ConfigFile> {
    if let Some(path) = path {
        return load_config_file(Path::new(path));
    }

    for candidate in [DEFAULT_TOML, DEFAULT_JSON] {
        let candidate = PathBuf::from(candidate);
        if candidate.exists() {
            return load_config_file(&candidate);
        }
    }

    Err(AppError::config(ConfigError::NotFound))
}

/// Parses a config file, choosing TOML or JSON by extension.
///
/// # Errors
///
/// Returns an error when the file cannot be read, has an unsupported
/// extension or does not parse.
pub fn load_config_file(path: &Path) -> AppResult<ConfigFile> {
    debug!(path = %path.display(), "Loading config.");
    let content = std::fs::read_to_string(path).map_err(|err| {
        AppError::config(ConfigError::ReadConfig {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|err| {
            AppError::config(ConfigError::ParseToml {
                path: path.to_path_buf(),
                source: err,
            })
        }),
        Some("json") => serde_json::from_str(&content).map_err(|err| {
            AppError::config(ConfigError::ParseJson {
                path: path.to_path_buf(),
                source: err,
            })
        }),
        Some(ext) => Err(AppError::config(ConfigError::UnsupportedExtension {
            ext: ext.to_owned(),
        })),
        None => Err(AppError::config(ConfigError::MissingExtension)),
    }
}
