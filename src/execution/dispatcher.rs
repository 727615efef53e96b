use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::admission::AdmissionController;
use crate::metrics::MetricsEmitter;

use super::command::CommandHandle;

/// Fires up to `batch_size` dispatches of one command, each behind the
/// admission gate, and waits for all of them.
pub struct BatchDispatcher {
    admission: Arc<AdmissionController>,
    emitter: Arc<dyn MetricsEmitter>,
}

impl BatchDispatcher {
    #[must_use]
    pub fn new(admission: Arc<AdmissionController>, emitter: Arc<dyn MetricsEmitter>) -> Self {
        Self { admission, emitter }
    }

    /// Returns how many dispatches were started. `continue_predicate` is
    /// checked before and after each admission wait; once it returns `false`
    /// the rest of the batch is dropped.
    pub async fn send_batch<P>(
        &self,
        command: &CommandHandle,
        batch_size: u64,
        continue_predicate: P,
        cancel: &CancellationToken,
    ) -> u64
    where
        P: Fn() -> bool,
    {
        let mut in_flight = JoinSet::new();
        let mut dispatched: u64 = 0;
        for _ in 0..batch_size {
            if !continue_predicate() {
                break;
            }
            self.admission.balance(command.target_host(), cancel).await;
            if !continue_predicate() {
                break;
            }
            let handle = command.clone();
            let token = cancel.clone();
            in_flight.spawn(async move { handle.dispatch(&token).await });
            dispatched = dispatched.saturating_add(1);
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(err) = joined {
                error!(fqdn = command.fqdn(), "Dispatch task failed: {}", err);
            }
        }
        self.emitter
            .batch_dispatched(command.fqdn(), batch_size, dispatched);
        dispatched
    }
}
