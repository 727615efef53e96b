use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::admission::AdmissionState;
use crate::domain::ExecutionStatus;

use super::types::ResponseRecord;

/// Telemetry hooks fired by the engine. Every hook defaults to a no-op.
pub trait MetricsEmitter: Send + Sync {
    fn response_recorded(&self, _fqdn: &str, _record: &ResponseRecord) {}

    fn batch_dispatched(&self, _fqdn: &str, _planned: u64, _dispatched: u64) {}

    fn admission_state_changed(&self, _from: AdmissionState, _to: AdmissionState) {}

    fn cooling_started(&self, _state: AdmissionState) {}

    fn admission_paused(&self, _resume_after: Duration) {}

    fn iteration_started(&self, _fqdn: &str) {}

    fn iteration_finished(&self, _fqdn: &str, _status: ExecutionStatus, _dispatched: u64) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmitter;

impl MetricsEmitter for NoopEmitter {}

/// Writes every hook as a tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEmitter;

impl MetricsEmitter for TracingEmitter {
    fn response_recorded(&self, fqdn: &str, record: &ResponseRecord) {
        trace!(
            fqdn,
            status_code = record.status_code,
            latency_ms = record.latency_ms(),
            transport_error = record.transport_error,
            "Response recorded."
        );
    }

    fn batch_dispatched(&self, fqdn: &str, planned: u64, dispatched: u64) {
        debug!(fqdn, planned, dispatched, "Batch dispatched.");
    }

    fn admission_state_changed(&self, from: AdmissionState, to: AdmissionState) {
        debug!(from = from.as_str(), to = to.as_str(), "Admission state changed.");
    }

    fn cooling_started(&self, state: AdmissionState) {
        info!(state = state.as_str(), "Cooling started.");
    }

    fn admission_paused(&self, resume_after: Duration) {
        info!(
            resume_after_ms = resume_after.as_millis(),
            "Admission control paused."
        );
    }

    fn iteration_started(&self, fqdn: &str) {
        debug!(fqdn, "Iteration started.");
    }

    fn iteration_finished(&self, fqdn: &str, status: ExecutionStatus, dispatched: u64) {
        debug!(fqdn, status = status.as_str(), dispatched, "Iteration finished.");
    }
}

/// Forwards every hook to each inner emitter in order.
#[derive(Clone, Default)]
pub struct FanoutEmitter {
    emitters: Vec<Arc<dyn MetricsEmitter>>,
}

impl FanoutEmitter {
    #[must_use]
    pub fn new(emitters: Vec<Arc<dyn MetricsEmitter>>) -> Self {
        Self { emitters }
    }
}

impl MetricsEmitter for FanoutEmitter {
    fn response_recorded(&self, fqdn: &str, record: &ResponseRecord) {
        for emitter in &self.emitters {
            emitter.response_recorded(fqdn, record);
        }
    }

    fn batch_dispatched(&self, fqdn: &str, planned: u64, dispatched: u64) {
        for emitter in &self.emitters {
            emitter.batch_dispatched(fqdn, planned, dispatched);
        }
    }

    fn admission_state_changed(&self, from: AdmissionState, to: AdmissionState) {
        for emitter in &self.emitters {
            emitter.admission_state_changed(from, to);
        }
    }

    fn cooling_started(&self, state: AdmissionState) {
        for emitter in &self.emitters {
            emitter.cooling_started(state);
        }
    }

    fn admission_paused(&self, resume_after: Duration) {
        for emitter in &self.emitters {
            emitter.admission_paused(resume_after);
        }
    }

    fn iteration_started(&self, fqdn: &str) {
        for emitter in &self.emitters {
            emitter.iteration_started(fqdn);
        }
    }

    fn iteration_finished(&self, fqdn: &str, status: ExecutionStatus, dispatched: u64) {
        for emitter in &self.emitters {
            emitter.iteration_finished(fqdn, status, dispatched);
        }
    }
}
