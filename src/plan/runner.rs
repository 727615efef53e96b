use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::admission::HostConnections;
use crate::domain::{ExecutionStatus, Iteration, Round, TestPlan, fqdn};
use crate::execution::{ExecuteCommand, ExecutionOutcome, ExecutionServices, build_unit};
use crate::http::ClientService;

use super::report::{ClientReport, PlanReport, RoundReport};

#[derive(Clone)]
pub struct PlanRunner {
    services: ExecutionServices,
    client: Arc<dyn ClientService>,
    connections: Arc<HostConnections>,
}

impl PlanRunner {
    #[must_use]
    pub fn new(
        services: ExecutionServices,
        client: Arc<dyn ClientService>,
        connections: Arc<HostConnections>,
    ) -> Self {
        Self {
            services,
            client,
            connections,
        }
    }

    /// Runs every round in order. Rounds left after cancellation are
    /// reported as cancelled without starting.
    pub async fn run(&self, plan: &TestPlan, cancel: &CancellationToken) -> PlanReport {
        let started_at = Utc::now();
        info!(plan = %plan.name, rounds = plan.rounds.len(), "Plan started.");
        let mut status = ExecutionStatus::NotStarted;
        let mut rounds = Vec::with_capacity(plan.rounds.len());
        for round in &plan.rounds {
            let report = if cancel.is_cancelled() {
                info!(round = %round.name, "Round skipped after cancellation.");
                RoundReport {
                    name: round.name.clone(),
                    status: ExecutionStatus::Cancelled,
                    clients: Vec::new(),
                }
            } else {
                self.run_round(&plan.name, round, cancel).await
            };
            status = status.merge(report.status);
            rounds.push(report);
        }
        PlanReport {
            name: plan.name.clone(),
            status,
            started_at: started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            rounds,
        }
    }

    async fn run_round(&self, plan_name: &str, round: &Round, cancel: &CancellationToken) -> RoundReport {
        info!(
            round = %round.name,
            clients = round.number_of_clients,
            iterations = round.iterations.len(),
            "Round started."
        );
        let mut clients = JoinSet::new();
        for client in 0..round.number_of_clients {
            let worker = ClientWorker {
                client,
                plan_name: plan_name.to_owned(),
                round_name: round.name.clone(),
                iterations: round.iterations.clone(),
                runner: self.clone(),
            };
            let delay = arrival_offset(round.arrival_delay, client);
            clients.spawn(worker.run(delay, cancel.clone()));
        }

        let mut reports = Vec::with_capacity(round.number_of_clients);
        while let Some(joined) = clients.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(err) => error!(round = %round.name, "Client task failed: {}", err),
            }
        }
        reports.sort_by_key(|report| report.client);

        let mut status = reports
            .iter()
            .fold(ExecutionStatus::NotStarted, |status, report| {
                status.merge(report.status)
            });
        if reports.len() < round.number_of_clients {
            status = status.merge(ExecutionStatus::Failed);
        }
        info!(round = %round.name, status = status.as_str(), "Round finished.");
        RoundReport {
            name: round.name.clone(),
            status,
            clients: reports,
        }
    }
}

struct ClientWorker {
    client: usize,
    plan_name: String,
    round_name: String,
    iterations: Vec<Arc<Iteration>>,
    runner: PlanRunner,
}

impl ClientWorker {
    async fn run(self, delay: Duration, cancel: CancellationToken) -> ClientReport {
        if !delay.is_zero() {
            tokio::select! {
                () = cancel.cancelled() => {
                    return ClientReport {
                        client: self.client,
                        status: ExecutionStatus::Cancelled,
                        iterations: Vec::new(),
                    };
                }
                () = sleep(delay) => {}
            }
        }

        let mut status = ExecutionStatus::NotStarted;
        let mut outcomes = Vec::with_capacity(self.iterations.len());
        for iteration in &self.iterations {
            if cancel.is_cancelled() {
                status = status.merge(ExecutionStatus::Cancelled);
                break;
            }
            let outcome = self.run_iteration(iteration, &cancel).await;
            status = status.merge(outcome.status);
            outcomes.push(outcome);
        }
        ClientReport {
            client: self.client,
            status,
            iterations: outcomes,
        }
    }

    async fn run_iteration(
        &self,
        iteration: &Arc<Iteration>,
        cancel: &CancellationToken,
    ) -> ExecutionOutcome {
        let runner = &self.runner;
        let unit = build_unit(
            &iteration.unit,
            Arc::clone(&runner.client),
            Arc::clone(&runner.connections),
        );
        match ExecuteCommand::new(
            Arc::clone(iteration),
            &self.plan_name,
            &self.round_name,
            unit,
            runner.services.clone(),
        ) {
            Ok(command) => command.execute(cancel).await,
            Err(err) => {
                let fqdn = fqdn(&self.plan_name, &self.round_name, &iteration.name);
                warn!(fqdn = %fqdn, client = self.client, "Skipping iteration: {}", err);
                ExecutionOutcome::skipped(fqdn, iteration.mode, &err)
            }
        }
    }
}

fn arrival_offset(arrival_delay: Option<Duration>, client: usize) -> Duration {
    arrival_delay.map_or(Duration::ZERO, |delay| {
        delay.saturating_mul(u32::try_from(client).unwrap_or(u32::MAX))
    })
}
