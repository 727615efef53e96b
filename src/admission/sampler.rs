use sysinfo::{Pid, Process, ProcessesToUpdate, System};
use tracing::debug;

use crate::error::AdmissionError;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Source of process memory and host CPU readings.
pub trait ResourceSampler: Send {
    /// Resident memory of this process in megabytes.
    ///
    /// # Errors
    ///
    /// Returns an error when the reading is unavailable.
    fn memory_mb(&mut self) -> Result<u64, AdmissionError>;

    /// Host CPU utilisation in percent.
    ///
    /// # Errors
    ///
    /// Returns an error when the reading is unavailable.
    fn cpu_percentage(&mut self) -> Result<f64, AdmissionError>;

    /// Hands freed heap pages back to the OS. Called once per cooling
    /// episode.
    fn reclaim_memory(&mut self) {}
}

pub struct SysinfoSampler {
    system: System,
    pid: Pid,
}

impl SysinfoSampler {
    /// # Errors
    ///
    /// Returns an error if the current process id cannot be resolved.
    pub fn new() -> Result<Self, AdmissionError> {
        let pid = sysinfo::get_current_pid()
            .map_err(|message| AdmissionError::CurrentPid { message })?;
        let mut system = System::new();
        // CPU usage is a delta between refreshes; prime the first one.
        system.refresh_cpu_usage();
        Ok(Self { system, pid })
    }

    fn rss_bytes(&mut self) -> Result<u64, AdmissionError> {
        if let Some(bytes) = read_statm_rss_bytes() {
            return Ok(bytes);
        }
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        self.system
            .process(self.pid)
            .map(Process::memory)
            .ok_or(AdmissionError::ProcessNotFound {
                pid: self.pid.as_u32(),
            })
    }
}

impl ResourceSampler for SysinfoSampler {
    fn memory_mb(&mut self) -> Result<u64, AdmissionError> {
        Ok(self.rss_bytes()?.checked_div(BYTES_PER_MB).unwrap_or(0))
    }

    fn cpu_percentage(&mut self) -> Result<f64, AdmissionError> {
        self.system.refresh_cpu_usage();
        Ok(f64::from(self.system.global_cpu_usage()))
    }

    fn reclaim_memory(&mut self) {
        trim_heap();
    }
}

fn read_statm_rss_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let mut parts = statm.split_whitespace();
        let _size = parts.next()?;
        let resident = parts.next()?.parse::<u64>().ok()?;
        // Safety: sysconf is safe to call; we only read the page size.
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if page_size <= 0 {
            return None;
        }
        let page_size = u64::try_from(page_size).ok()?;
        Some(resident.saturating_mul(page_size))
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn trim_heap() {
    // Safety: malloc_trim only releases free memory held by the glibc
    // allocator and has no preconditions.
    let released = unsafe { libc::malloc_trim(0) };
    debug!(released = released != 0, "Trimmed allocator heap.");
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
fn trim_heap() {
    debug!("Heap trimming is not supported on this platform.");
}
