use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::admission::HostConnections;
use crate::domain::{SessionSpec, UnitSpec};
use crate::error::HttpError;
use crate::http::{ClientService, RequestSpec};
use crate::metrics::ResponseRecord;

use super::command::CommandState;

/// The work performed by one dispatch.
#[async_trait]
pub trait DispatchUnit: Send + Sync {
    /// Host the admission gate checks before each dispatch.
    fn target_host(&self) -> &str;

    /// Sends the unit and records every response on `state`.
    async fn dispatch(&self, state: &CommandState, cancel: &CancellationToken);
}

pub struct RequestUnit {
    request: RequestSpec,
    client: Arc<dyn ClientService>,
    connections: Arc<HostConnections>,
}

impl RequestUnit {
    #[must_use]
    pub fn new(
        request: RequestSpec,
        client: Arc<dyn ClientService>,
        connections: Arc<HostConnections>,
    ) -> Self {
        Self {
            request,
            client,
            connections,
        }
    }
}

#[async_trait]
impl DispatchUnit for RequestUnit {
    fn target_host(&self) -> &str {
        self.request.host()
    }

    async fn dispatch(&self, state: &CommandState, cancel: &CancellationToken) {
        send_and_record(
            self.client.as_ref(),
            &self.connections,
            &self.request,
            state,
            cancel,
        )
        .await;
    }
}

/// Ordered steps sent one after another; the whole session counts as one
/// dispatch.
pub struct SessionUnit {
    session: SessionSpec,
    client: Arc<dyn ClientService>,
    connections: Arc<HostConnections>,
}

impl SessionUnit {
    #[must_use]
    pub fn new(
        session: SessionSpec,
        client: Arc<dyn ClientService>,
        connections: Arc<HostConnections>,
    ) -> Self {
        Self {
            session,
            client,
            connections,
        }
    }
}

#[async_trait]
impl DispatchUnit for SessionUnit {
    fn target_host(&self) -> &str {
        self.session
            .steps
            .first()
            .map_or("", |step| step.request.host())
    }

    async fn dispatch(&self, state: &CommandState, cancel: &CancellationToken) {
        for step in &self.session.steps {
            if cancel.is_cancelled() {
                break;
            }
            let sent = send_and_record(
                self.client.as_ref(),
                &self.connections,
                &step.request,
                state,
                cancel,
            )
            .await;
            if !sent {
                break;
            }
            if let Some(think_time) = step.think_time {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = sleep(think_time) => {}
                }
            }
        }
    }
}

#[must_use]
pub fn build_unit(
    spec: &UnitSpec,
    client: Arc<dyn ClientService>,
    connections: Arc<HostConnections>,
) -> Arc<dyn DispatchUnit> {
    match spec {
        UnitSpec::Request(request) => {
            Arc::new(RequestUnit::new(request.clone(), client, connections))
        }
        UnitSpec::Session(session) => {
            Arc::new(SessionUnit::new(session.clone(), client, connections))
        }
    }
}

/// Returns `false` when the request was not sent because of cancellation.
async fn send_and_record(
    client: &dyn ClientService,
    connections: &HostConnections,
    request: &RequestSpec,
    state: &CommandState,
    cancel: &CancellationToken,
) -> bool {
    let _connection = connections.acquire(request.host());
    let start = Instant::now();
    match client.send(request, cancel).await {
        Ok(response) => {
            state.record_response(ResponseRecord::new(start, response.status_code, false));
            true
        }
        Err(HttpError::Cancelled) => false,
        Err(err) => {
            debug!(fqdn = state.fqdn(), "Request failed: {}", err);
            state.record_response(ResponseRecord::transport_failure(start));
            true
        }
    }
}
