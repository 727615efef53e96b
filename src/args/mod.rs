//! CLI argument types.
mod cli;


pub use cli::{Cli, Command, RunArgs, ValidateArgs};
