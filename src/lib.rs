//! Core library for the `volley` load engine.
//!
//! A test plan is a list of rounds; each round runs a number of clients, and
//! each client runs the round's iterations in order. An iteration fires HTTP
//! requests under one of five temporal modes, every dispatch passing through
//! a process-wide admission gate, while termination rules watch the trailing
//! error rate. The `volley` binary wires these pieces to a config file.
pub mod admission;
pub mod config;
pub mod domain;
pub mod error;
pub mod execution;
pub mod http;
pub mod metrics;
pub mod plan;
pub mod rules;
