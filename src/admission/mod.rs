//! Resource watchdog gating each dispatch on process memory, host CPU and
//! per-host connection counts.
mod config;
mod connections;
mod controller;
mod sampler;


pub use config::{SuspensionMode, WatchdogConfig};
pub use connections::{ConnectionGuard, ConnectionSource, HostConnections};
pub use controller::{AdmissionController, AdmissionState, ResourceUsage};
pub use sampler::{ResourceSampler, SysinfoSampler};
