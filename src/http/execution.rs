use futures_util::StreamExt;
use reqwest::{Client, Request};

use crate::error::HttpError;

use super::types::ResponseSummary;

pub(super) async fn execute_request(
    client: &Client,
    request: Request,
) -> Result<ResponseSummary, HttpError> {
    let url = request.url().to_string();
    let response = client
        .execute(request)
        .await
        .map_err(|err| classify(url.clone(), err))?;
    let status_code = response.status().as_u16();
    let response_bytes = drain_response_body(response)
        .await
        .map_err(|err| {
            if err.is_timeout() {
                HttpError::Timeout { url: url.clone() }
            } else {
                HttpError::BodyRead {
                    url: url.clone(),
                    source: err,
                }
            }
        })?;
    Ok(ResponseSummary {
        status_code,
        response_bytes,
    })
}

fn classify(url: String, err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout { url }
    } else {
        HttpError::Transport { url, source: err }
    }
}

async fn drain_response_body(response: reqwest::Response) -> Result<u64, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut total_bytes: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        total_bytes = total_bytes.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
    }
    Ok(total_bytes)
}
