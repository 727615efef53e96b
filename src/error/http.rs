use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {source}")]
    BuildClientFailed {
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to build request for '{url}': {source}")]
    BuildRequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request to '{url}' timed out.")]
    Timeout { url: String },
    #[error("Request to '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to read response body from '{url}': {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request was cancelled before it was sent.")]
    Cancelled,
}

impl HttpError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout { .. })
    }
}
