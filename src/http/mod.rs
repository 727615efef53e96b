//! HTTP collaborator: request description and the client that sends it.
mod client;
mod execution;
mod types;


pub use client::{ClientService, ClientSettings, DEFAULT_USER_AGENT, ReqwestClientService};
pub use types::{HttpMethod, RequestSpec, ResponseSummary};
