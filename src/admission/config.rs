use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the three resource checks combine into "Hot".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuspensionMode {
    /// Any single exceeded threshold is enough.
    #[default]
    Any,
    /// Every threshold must be exceeded.
    All,
}

impl SuspensionMode {
    #[must_use]
    pub fn combine(self, checks: [bool; 3]) -> bool {
        match self {
            SuspensionMode::Any => checks.into_iter().any(|exceeded| exceeded),
            SuspensionMode::All => checks.into_iter().all(|exceeded| exceeded),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchdogConfig {
    pub max_memory_mb: u64,
    pub max_cpu_percentage: f64,
    pub max_connections_per_host: u64,
    pub cool_down_memory_mb: u64,
    pub cool_down_cpu_percentage: f64,
    pub cool_down_connections_per_host: u64,
    /// Sleep between samples while waiting for resources to cool.
    pub cool_down_retry_time: Duration,
    /// Longest a single cooling episode may block before admission pauses.
    pub max_cooling_period: Duration,
    /// How long admission stays paused after a cooling episode times out.
    pub resume_cooling_after: Duration,
    pub suspension_mode: SuspensionMode,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 2048,
            max_cpu_percentage: 80.0,
            max_connections_per_host: 1000,
            cool_down_memory_mb: 1536,
            cool_down_cpu_percentage: 60.0,
            cool_down_connections_per_host: 900,
            cool_down_retry_time: Duration::from_secs(1),
            max_cooling_period: Duration::from_secs(60),
            resume_cooling_after: Duration::from_secs(10),
            suspension_mode: SuspensionMode::Any,
        }
    }
}

impl WatchdogConfig {
    /// Names of the first cool-down/ceiling pair where the cool-down
    /// threshold sits above the ceiling.
    #[must_use]
    pub fn inverted_thresholds(&self) -> Option<(&'static str, &'static str)> {
        if self.cool_down_memory_mb > self.max_memory_mb {
            return Some(("cool_down_memory_mb", "max_memory_mb"));
        }
        if self.cool_down_cpu_percentage > self.max_cpu_percentage {
            return Some(("cool_down_cpu_percentage", "max_cpu_percentage"));
        }
        if self.cool_down_connections_per_host > self.max_connections_per_host {
            return Some((
                "cool_down_connections_per_host",
                "max_connections_per_host",
            ));
        }
        None
    }
}
