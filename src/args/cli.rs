use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Plan-driven HTTP load engine: duration, request-count and cooldown-batch iterations behind a resource watchdog and error-rate termination rules."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging (overridden by VOLLEY_LOG / RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable ANSI colors in log output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a test plan
    Run(RunArgs),
    /// Load and validate a test plan without sending requests
    Validate(ValidateArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Path to the plan config (.toml or .json); defaults to volley.toml, then volley.json
    #[arg(long, short, env = "VOLLEY_CONFIG")]
    pub config: Option<String>,

    /// Write the run report as JSON to this path
    #[arg(long = "report-json")]
    pub report_json: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ValidateArgs {
    /// Path to the plan config (.toml or .json); defaults to volley.toml, then volley.json
    #[arg(long, short, env = "VOLLEY_CONFIG")]
    pub config: Option<String>,
}
