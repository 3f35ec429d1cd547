//! Response helpers shared by every backend client.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::UpstreamError;

/// Longest response body excerpt written to logs.
const LOG_BODY_LIMIT: usize = 2000;

/// Build the shared HTTP client with an explicit per-request timeout.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or an [`UpstreamError::Api`] containing the status
/// and body text on failure.
pub(crate) async fn ensure_success(
    backend: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        tracing::warn!(
            backend,
            status = status.as_u16(),
            body = %truncate_for_log(&body),
            "Upstream returned non-success status",
        );
        return Err(UpstreamError::Api {
            backend,
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Parse a successful JSON response body into the expected type.
///
/// Transport failures keep their timeout classification; payloads that do
/// not deserialize become [`UpstreamError::InvalidResponse`].
pub(crate) async fn parse_json<T: DeserializeOwned>(
    backend: &'static str,
    response: reqwest::Response,
) -> Result<T, UpstreamError> {
    let response = ensure_success(backend, response).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| UpstreamError::from_reqwest(backend, e))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::warn!(
            backend,
            error = %e,
            body = %truncate_for_log(&String::from_utf8_lossy(&bytes)),
            "Upstream payload did not match the expected shape",
        );
        UpstreamError::invalid(backend, e.to_string())
    })
}

/// Shorten a body for log output, respecting UTF-8 boundaries.
pub(crate) fn truncate_for_log(body: &str) -> &str {
    if body.len() <= LOG_BODY_LIMIT {
        return body;
    }
    let mut end = LOG_BODY_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// MIME type of an encoded image, sniffed from its magic bytes.
pub(crate) fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}
