use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::admission::{
    AdmissionController, HostConnections, ResourceSampler, WatchdogConfig,
};
use crate::domain::{ExecutionStatus, Iteration, IterationContext, Mode, UnitSpec};
use crate::error::{AdmissionError, HttpError};
use crate::http::{ClientService, RequestSpec, ResponseSummary};
use crate::metrics::{MetricsEmitter, NoopEmitter, ResponseLog};
use crate::rules::{StatusFilterSet, TerminationCheck, TerminationChecker};

use super::command::ExecutionServices;

pub(crate) const TEST_URL: &str = "http://load.test/ping";

pub(crate) fn run_paused_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn test_request() -> Result<RequestSpec, String> {
    let url = Url::parse(TEST_URL).map_err(|err| format!("bad url: {}", err))?;
    Ok(RequestSpec::get(url))
}

pub(crate) fn iteration(mode: Mode) -> Result<Iteration, String> {
    Ok(Iteration {
        name: "checkout".to_owned(),
        mode,
        request_count: None,
        duration: None,
        batch_size: None,
        cool_down_time: None,
        maximize_throughput: false,
        termination_rules: Vec::new(),
        error_status_codes: StatusFilterSet::default_errors(),
        startup_delay: None,
        unit: UnitSpec::Request(test_request()?),
    })
}

pub(crate) fn context_for(iteration: &Iteration) -> IterationContext {
    IterationContext {
        fqdn: format!("plan.round.{}", iteration.name),
        iteration_id: iteration.name.clone(),
        round_name: "round".to_owned(),
        termination_rules: Arc::from(iteration.termination_rules.as_slice()),
    }
}

/// Client that answers from a status script after an optional latency and
/// records when each send started.
pub(crate) struct MockClient {
    latency: Duration,
    statuses: Mutex<VecDeque<u16>>,
    fallback_status: u16,
    sends: Mutex<Vec<Instant>>,
    in_flight: AtomicU64,
    peak_in_flight: AtomicU64,
}

impl MockClient {
    pub(crate) fn ok(latency: Duration) -> Self {
        Self::scripted(latency, Vec::new(), 200)
    }

    pub(crate) fn scripted(latency: Duration, statuses: Vec<u16>, fallback_status: u16) -> Self {
        Self {
            latency,
            statuses: Mutex::new(statuses.into()),
            fallback_status,
            sends: Mutex::new(Vec::new()),
            in_flight: AtomicU64::new(0),
            peak_in_flight: AtomicU64::new(0),
        }
    }

    pub(crate) fn send_times(&self) -> Vec<Instant> {
        lock(&self.sends).clone()
    }

    pub(crate) fn send_count(&self) -> usize {
        lock(&self.sends).len()
    }

    pub(crate) fn peak_in_flight(&self) -> u64 {
        self.peak_in_flight.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ClientService for MockClient {
    async fn send(
        &self,
        _request: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<ResponseSummary, HttpError> {
        if cancel.is_cancelled() {
            return Err(HttpError::Cancelled);
        }
        lock(&self.sends).push(Instant::now());
        let current = self.in_flight.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        self.peak_in_flight.fetch_max(current, Ordering::Relaxed);
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        let status_code = lock(&self.statuses)
            .pop_front()
            .unwrap_or(self.fallback_status);
        Ok(ResponseSummary {
            status_code,
            response_bytes: 0,
        })
    }
}

/// Sampler replaying a script of (memory MB, CPU %) readings; the last one
/// repeats once the script runs out.
pub(crate) struct ScriptedSampler {
    readings: Arc<Mutex<VecDeque<(u64, f64)>>>,
    last: (u64, f64),
    samples: Arc<AtomicU64>,
    reclaims: Arc<AtomicU64>,
    fail: bool,
}

impl ScriptedSampler {
    pub(crate) fn cool() -> Self {
        Self::scripted(Vec::new(), (10, 1.0))
    }

    pub(crate) fn scripted(readings: Vec<(u64, f64)>, last: (u64, f64)) -> Self {
        Self {
            readings: Arc::new(Mutex::new(readings.into())),
            last,
            samples: Arc::new(AtomicU64::new(0)),
            reclaims: Arc::new(AtomicU64::new(0)),
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        let mut sampler = Self::cool();
        sampler.fail = true;
        sampler
    }

    pub(crate) fn samples(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.samples)
    }

    pub(crate) fn reclaims(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.reclaims)
    }

    fn next(&mut self) -> (u64, f64) {
        if let Some(reading) = lock(&self.readings).pop_front() {
            self.last = reading;
        }
        self.last
    }
}

impl ResourceSampler for ScriptedSampler {
    fn memory_mb(&mut self) -> Result<u64, AdmissionError> {
        if self.fail {
            return Err(AdmissionError::ProcessNotFound { pid: 0 });
        }
        self.samples.fetch_add(1, Ordering::Relaxed);
        Ok(self.next().0)
    }

    fn cpu_percentage(&mut self) -> Result<f64, AdmissionError> {
        Ok(self.last.1)
    }

    fn reclaim_memory(&mut self) {
        self.reclaims.fetch_add(1, Ordering::Relaxed);
    }
}

pub(crate) fn cool_admission(emitter: Arc<dyn MetricsEmitter>) -> Arc<AdmissionController> {
    Arc::new(AdmissionController::new(
        WatchdogConfig::default(),
        Box::new(ScriptedSampler::cool()),
        Arc::new(HostConnections::new()),
        emitter,
    ))
}

/// Termination check that fires on the `fire_on`-th poll (1-based).
pub(crate) struct FireOnPoll {
    fire_on: u64,
    polls: AtomicU64,
    finished: AtomicU64,
}

impl FireOnPoll {
    pub(crate) fn new(fire_on: u64) -> Self {
        Self {
            fire_on,
            polls: AtomicU64::new(0),
            finished: AtomicU64::new(0),
        }
    }

    pub(crate) fn never() -> Self {
        Self::new(u64::MAX)
    }

    pub(crate) fn finished_calls(&self) -> u64 {
        self.finished.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TerminationCheck for FireOnPoll {
    async fn is_termination_required(
        &self,
        _iteration: &IterationContext,
        _cancel: &CancellationToken,
    ) -> bool {
        let poll = self.polls.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        poll >= self.fire_on
    }

    fn iteration_finished(&self, _iteration: &IterationContext) {
        self.finished.fetch_add(1, Ordering::Relaxed);
    }
}

/// Captures batch sizes and final statuses.
#[derive(Default)]
pub(crate) struct RecordingEmitter {
    pub(crate) batches: Mutex<Vec<(u64, u64)>>,
    pub(crate) finished: Mutex<Vec<ExecutionStatus>>,
}

impl MetricsEmitter for RecordingEmitter {
    fn batch_dispatched(&self, _fqdn: &str, planned: u64, dispatched: u64) {
        lock(&self.batches).push((planned, dispatched));
    }

    fn iteration_finished(&self, _fqdn: &str, status: ExecutionStatus, _dispatched: u64) {
        lock(&self.finished).push(status);
    }
}

pub(crate) fn services_with(
    termination: Arc<dyn TerminationCheck>,
    emitter: Arc<dyn MetricsEmitter>,
) -> ExecutionServices {
    ExecutionServices {
        admission: cool_admission(Arc::clone(&emitter)),
        termination,
        emitter,
    }
}

pub(crate) fn default_services() -> ExecutionServices {
    services_with(Arc::new(FireOnPoll::never()), Arc::new(NoopEmitter))
}

/// Services whose termination rules read a real response log.
pub(crate) fn rule_services() -> (ExecutionServices, Arc<ResponseLog>) {
    let log = Arc::new(ResponseLog::default());
    let termination = Arc::new(TerminationChecker::new(log.clone()));
    let services = services_with(termination, Arc::clone(&log) as Arc<dyn MetricsEmitter>);
    (services, log)
}
