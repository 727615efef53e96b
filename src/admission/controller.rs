use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AdmissionError;
use crate::metrics::MetricsEmitter;

use super::config::WatchdogConfig;
use super::connections::ConnectionSource;
use super::sampler::ResourceSampler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionState {
    /// Below the cool-down thresholds.
    Cool,
    /// Between the cool-down thresholds and the ceilings while not yet cool.
    Cooling,
    /// Above a ceiling.
    Hot,
    /// No reading yet, or the last reading failed.
    Unknown,
}

impl AdmissionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AdmissionState::Cool => "cool",
            AdmissionState::Cooling => "cooling",
            AdmissionState::Hot => "hot",
            AdmissionState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AdmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sample of the guarded resources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    pub memory_mb: u64,
    pub cpu_percentage: f64,
    pub connections: u64,
}

struct Gate {
    sampler: Box<dyn ResourceSampler>,
    state: AdmissionState,
    cooling_since: Option<Instant>,
    paused_until: Option<Instant>,
}

/// Process-wide admission gate. Callers are serialised: at most one
/// `balance` call evaluates resources or sleeps at a time.
pub struct AdmissionController {
    config: WatchdogConfig,
    connections: Arc<dyn ConnectionSource>,
    emitter: Arc<dyn MetricsEmitter>,
    gate: Mutex<Gate>,
}

impl AdmissionController {
    #[must_use]
    pub fn new(
        config: WatchdogConfig,
        sampler: Box<dyn ResourceSampler>,
        connections: Arc<dyn ConnectionSource>,
        emitter: Arc<dyn MetricsEmitter>,
    ) -> Self {
        Self {
            config,
            connections,
            emitter,
            gate: Mutex::new(Gate {
                sampler,
                state: AdmissionState::Unknown,
                cooling_since: None,
                paused_until: None,
            }),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// Last state observed by any caller.
    pub async fn state(&self) -> AdmissionState {
        self.gate.lock().await.state
    }

    /// Blocks until `host` may receive another request and returns the state
    /// that admitted it.
    ///
    /// Sampling failures admit the request and return `Unknown`. A cooling
    /// episode longer than `max_cooling_period` pauses the gate for
    /// `resume_cooling_after`, during which every call returns at once.
    /// Cancellation returns at once with the latest known state.
    pub async fn balance(&self, host: &str, cancel: &CancellationToken) -> AdmissionState {
        let mut gate = tokio::select! {
            () = cancel.cancelled() => return AdmissionState::Unknown,
            gate = self.gate.lock() => gate,
        };
        match self.balance_locked(&mut gate, host, cancel).await {
            Ok(state) => state,
            Err(err) => {
                warn!(host, "Resource sampling failed, admitting request: {}", err);
                gate.state = AdmissionState::Unknown;
                AdmissionState::Unknown
            }
        }
    }

    async fn balance_locked(
        &self,
        gate: &mut Gate,
        host: &str,
        cancel: &CancellationToken,
    ) -> Result<AdmissionState, AdmissionError> {
        if let Some(until) = gate.paused_until {
            if Instant::now() < until {
                return Ok(gate.state);
            }
            gate.paused_until = None;
            info!("Admission control resumed.");
        }

        let mut state = self.evaluate(gate, host).await?;
        while state != AdmissionState::Cool && !cancel.is_cancelled() {
            if gate.cooling_since.is_none() {
                gate.sampler.reclaim_memory();
                self.emitter.cooling_started(state);
                debug!(host, state = state.as_str(), "Cooling episode started.");
            }
            let cooling_since = *gate.cooling_since.get_or_insert_with(Instant::now);

            if cooling_since.elapsed() > self.config.max_cooling_period {
                gate.cooling_since = None;
                gate.paused_until = Instant::now().checked_add(self.config.resume_cooling_after);
                self.emitter
                    .admission_paused(self.config.resume_cooling_after);
                warn!(
                    host,
                    state = state.as_str(),
                    "Resources did not cool within {:?}; admitting without checks for {:?}.",
                    self.config.max_cooling_period,
                    self.config.resume_cooling_after
                );
                break;
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = sleep(self.config.cool_down_retry_time) => {}
            }
            state = self.evaluate(gate, host).await?;
        }

        if state == AdmissionState::Cool {
            gate.cooling_since = None;
        }
        Ok(state)
    }

    async fn evaluate(
        &self,
        gate: &mut Gate,
        host: &str,
    ) -> Result<AdmissionState, AdmissionError> {
        let usage = ResourceUsage {
            memory_mb: gate.sampler.memory_mb()?,
            cpu_percentage: gate.sampler.cpu_percentage()?,
            connections: self.connections.active_connections(host).await?,
        };
        let state = self.classify(&usage, gate.state);
        if state != gate.state {
            debug!(
                host,
                from = gate.state.as_str(),
                to = state.as_str(),
                memory_mb = usage.memory_mb,
                cpu_percentage = usage.cpu_percentage,
                connections = usage.connections,
                "Admission state changed."
            );
            self.emitter.admission_state_changed(gate.state, state);
            gate.state = state;
        }
        Ok(state)
    }

    /// Maps a sample onto a state given the previous one.
    #[must_use]
    pub fn classify(&self, usage: &ResourceUsage, previous: AdmissionState) -> AdmissionState {
        let config = &self.config;
        let mode = config.suspension_mode;
        let hot = mode.combine([
            usage.memory_mb > config.max_memory_mb,
            usage.cpu_percentage >= config.max_cpu_percentage,
            usage.connections > config.max_connections_per_host,
        ]);
        if hot {
            return AdmissionState::Hot;
        }
        let warm = mode.combine([
            usage.memory_mb > config.cool_down_memory_mb,
            usage.cpu_percentage >= config.cool_down_cpu_percentage,
            usage.connections > config.cool_down_connections_per_host,
        ]);
        if warm && previous != AdmissionState::Cool {
            AdmissionState::Cooling
        } else {
            AdmissionState::Cool
        }
    }
}
