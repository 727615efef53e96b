use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::AdmissionError;

/// Reports how many connections are currently open to a host.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the count cannot be read.
    async fn active_connections(&self, host: &str) -> Result<u64, AdmissionError>;
}

/// Counts requests in flight per host. Each dispatch holds a
/// [`ConnectionGuard`] for the lifetime of its request.
#[derive(Debug, Default)]
pub struct HostConnections {
    hosts: DashMap<String, Arc<AtomicU64>>,
}

impl HostConnections {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn acquire(&self, host: &str) -> ConnectionGuard {
        let counter = self
            .hosts
            .get(host)
            .map(|counter| Arc::clone(counter.value()))
            .unwrap_or_else(|| Arc::clone(self.hosts.entry(host.to_owned()).or_default().value()));
        counter.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard { counter }
    }

    #[must_use]
    pub fn count(&self, host: &str) -> u64 {
        self.hosts
            .get(host)
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }
}

#[async_trait]
impl ConnectionSource for HostConnections {
    async fn active_connections(&self, host: &str) -> Result<u64, AdmissionError> {
        Ok(self.count(host))
    }
}

#[derive(Debug)]
pub struct ConnectionGuard {
    counter: Arc<AtomicU64>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        loop {
            let current = self.counter.load(Ordering::Relaxed);
            let Some(next) = current.checked_sub(1) else {
                break;
            };
            if self
                .counter
                .compare_exchange(current, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }
}
