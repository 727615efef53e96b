//! Runs a whole test plan: rounds in order, clients within a round in
//! parallel, iterations within a client in order.
mod report;
mod runner;


pub use report::{ClientReport, PlanReport, RoundReport};
pub use runner::PlanRunner;
