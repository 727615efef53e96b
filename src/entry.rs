use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use volley::admission::{AdmissionController, HostConnections, SysinfoSampler};
use volley::config::{RunConfig, apply_config, load_config};
use volley::domain::ExecutionStatus;
use volley::error::{AppError, AppResult};
use volley::execution::ExecutionServices;
use volley::http::ReqwestClientService;
use volley::metrics::{FanoutEmitter, MetricsEmitter, ResponseLog, TracingEmitter};
use volley::plan::PlanRunner;
use volley::rules::TerminationChecker;

use crate::args::{Cli, Command, RunArgs, ValidateArgs};

pub(crate) fn run() -> AppResult<()> {
    let cli = Cli::parse();

    crate::logger::init_logging(cli.verbose, cli.no_color);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_async(cli))
}

async fn run_async(cli: Cli) -> AppResult<()> {
    match cli.command {
        Command::Run(args) => run_plan(&args).await,
        Command::Validate(args) => validate_plan(&args),
    }
}

fn load_run_config(config: Option<&str>) -> AppResult<RunConfig> {
    let file = load_config(config)?;
    let run_config = apply_config(&file)?;
    run_config.plan.validate()?;
    Ok(run_config)
}

fn validate_plan(args: &ValidateArgs) -> AppResult<()> {
    let run_config = load_run_config(args.config.as_deref())?;
    let invalid = run_config.plan.invalid_iterations();
    for (round, iteration, err) in &invalid {
        error!(round = %round, iteration = %iteration, "Invalid iteration: {}", err);
    }
    if let Some((_, _, err)) = invalid.into_iter().next() {
        return Err(AppError::validation(err));
    }
    info!(plan = %run_config.plan.name, "Plan is valid.");
    Ok(())
}

async fn run_plan(args: &RunArgs) -> AppResult<()> {
    let run_config = load_run_config(args.config.as_deref())?;
    for (round, iteration, err) in run_config.plan.invalid_iterations() {
        error!(
            round = %round,
            iteration = %iteration,
            "Iteration will be skipped: {}",
            err
        );
    }

    let connections = Arc::new(HostConnections::new());
    let response_log = Arc::new(ResponseLog::new(run_config.response_log));
    let emitter: Arc<dyn MetricsEmitter> = Arc::new(FanoutEmitter::new(vec![
        Arc::clone(&response_log) as Arc<dyn MetricsEmitter>,
        Arc::new(TracingEmitter),
    ]));
    let admission = Arc::new(AdmissionController::new(
        run_config.watchdog.clone(),
        Box::new(SysinfoSampler::new()?),
        connections.clone(),
        Arc::clone(&emitter),
    ));
    let termination = Arc::new(TerminationChecker::new(response_log));
    let client = Arc::new(ReqwestClientService::new(&run_config.client)?);
    let runner = PlanRunner::new(
        ExecutionServices {
            admission,
            termination,
            emitter,
        },
        client,
        connections,
    );

    let cancel = CancellationToken::new();
    let signal_task = crate::shutdown_handlers::setup_signal_shutdown_handler(&cancel);
    let report = runner.run(&run_config.plan, &cancel).await;
    signal_task.abort();

    report.log_summary();
    if let Some(path) = args.report_json.as_deref() {
        report.write_json(Path::new(path)).await?;
        info!(path, "Report written.");
    }
    if report
        .outcomes()
        .any(|outcome| outcome.status == ExecutionStatus::Failed)
    {
        return Err(AppError::RunFailed {
            plan: report.name,
            status: report.status,
        });
    }
    Ok(())
}
