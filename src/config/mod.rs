//! Configuration loading and application.
mod apply;
mod loader;
mod parse;
pub mod types;

#[cfg(test)]
mod tests;

pub use apply::{RunConfig, apply_config};
pub use loader::{load_config, load_config_file};
pub use parse::parse_duration_value;
