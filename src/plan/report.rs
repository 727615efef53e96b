use std::path::Path;

use serde::Serialize;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

use crate::domain::ExecutionStatus;
use crate::error::AppResult;
use crate::execution::ExecutionOutcome;

#[derive(Debug, Clone, Serialize)]
pub struct ClientReport {
    pub client: usize,
    pub status: ExecutionStatus,
    pub iterations: Vec<ExecutionOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub name: String,
    pub status: ExecutionStatus,
    pub clients: Vec<ClientReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub name: String,
    pub status: ExecutionStatus,
    pub started_at: String,
    pub finished_at: String,
    pub rounds: Vec<RoundReport>,
}

impl PlanReport {
    #[must_use]
    pub fn total_dispatched(&self) -> u64 {
        self.outcomes()
            .fold(0_u64, |sum, outcome| sum.saturating_add(outcome.dispatched))
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &ExecutionOutcome> {
        self.rounds
            .iter()
            .flat_map(|round| round.clients.iter())
            .flat_map(|client| client.iterations.iter())
    }

    pub fn log_summary(&self) {
        info!(
            plan = %self.name,
            status = self.status.as_str(),
            dispatched = self.total_dispatched(),
            "Plan finished."
        );
        for round in &self.rounds {
            info!(round = %round.name, status = round.status.as_str(), "Round summary.");
            for client in &round.clients {
                for outcome in &client.iterations {
                    info!(
                        client = client.client,
                        fqdn = %outcome.fqdn,
                        mode = outcome.mode.as_str(),
                        status = outcome.status.as_str(),
                        dispatched = outcome.dispatched,
                        successful = outcome.successful_calls,
                        failed = outcome.failed_calls,
                        elapsed_ms = outcome.elapsed_ms,
                        "Iteration summary."
                    );
                }
            }
        }
    }

    /// Writes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn write_json(&self, path: &Path) -> AppResult<()> {
        let payload = serde_json::to_vec_pretty(self)?;
        let file = tokio::fs::File::create(path).await?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&payload).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}
