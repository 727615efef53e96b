use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::error::HttpError;

use super::execution::execute_request;
use super::types::{HttpMethod, RequestSpec, ResponseSummary};

pub const DEFAULT_USER_AGENT: &str = concat!("volley/", env!("CARGO_PKG_VERSION"));

/// Sends one HTTP request.
///
/// Implementations check `cancel` before sending only. A request that has
/// already left is driven to completion so in-flight work is never abandoned.
#[async_trait]
pub trait ClientService: Send + Sync {
    async fn send(
        &self,
        request: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<ResponseSummary, HttpError>;
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_max_idle_per_host: Option<usize>,
    pub disable_keepalive: bool,
    pub insecure: bool,
    pub user_agent: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: None,
            disable_keepalive: false,
            insecure: false,
            user_agent: Some(DEFAULT_USER_AGENT.to_owned()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestClientService {
    client: Client,
}

impl ReqwestClientService {
    /// Builds the shared reqwest client.
    ///
    /// # Errors
    ///
    /// Returns an error when the TLS backend or client cannot be initialized.
    pub fn new(settings: &ClientSettings) -> Result<Self, HttpError> {
        let mut builder = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout);

        if let Some(user_agent) = settings.user_agent.as_deref() {
            builder = builder.user_agent(user_agent);
        }
        if settings.disable_keepalive {
            builder = builder
                .pool_max_idle_per_host(0)
                .pool_idle_timeout(Some(Duration::from_secs(0)));
        } else if let Some(max_idle) = settings.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(max_idle);
        }
        if settings.insecure {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        let client = builder
            .build()
            .map_err(|source| HttpError::BuildClientFailed { source })?;
        Ok(Self { client })
    }

    fn build_request(&self, spec: &RequestSpec) -> Result<reqwest::Request, HttpError> {
        let url = spec.url.clone();
        let mut builder = match spec.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Patch => self.client.patch(url),
            HttpMethod::Put => self.client.put(url),
            HttpMethod::Delete => self.client.delete(url),
        };
        for (key, value) in &spec.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = spec.body.as_ref() {
            builder = builder.body(body.clone());
        }
        builder
            .build()
            .map_err(|source| HttpError::BuildRequestFailed {
                url: spec.url.to_string(),
                source,
            })
    }
}

#[async_trait]
impl ClientService for ReqwestClientService {
    async fn send(
        &self,
        request: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<ResponseSummary, HttpError> {
        if cancel.is_cancelled() {
            return Err(HttpError::Cancelled);
        }
        let request = self.build_request(request)?;
        execute_request(&self.client, request).await
    }
}
