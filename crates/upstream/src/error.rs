//! Errors from the upstream backend layer.

/// Failure talking to a third-party backend.
///
/// Every variant names the backend so logs and HTTP error bodies can tell
/// Ideogram, Gemini, Ollama and the image host apart.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The HTTP request itself failed (network, DNS, TLS, body read).
    #[error("{backend} request failed: {source}")]
    Request {
        backend: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// No response within the configured client timeout.
    #[error("{backend} request timed out")]
    Timeout { backend: &'static str },

    /// The backend returned a non-2xx status code.
    #[error("{backend} API error ({status}): {body}")]
    Api {
        backend: &'static str,
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose payload does not match the expected contract.
    #[error("{backend} returned an invalid response: {message}")]
    InvalidResponse {
        backend: &'static str,
        message: String,
    },
}

impl UpstreamError {
    /// Classify a transport error, separating timeouts from other failures.
    pub fn from_reqwest(backend: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { backend }
        } else {
            Self::Request { backend, source }
        }
    }

    pub fn invalid(backend: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            backend,
            message: message.into(),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Self::Request { backend, .. }
            | Self::Timeout { backend }
            | Self::Api { backend, .. }
            | Self::InvalidResponse { backend, .. } => backend,
        }
    }

    /// Upstream HTTP status, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a retry could plausibly succeed: timeouts, transport
    /// failures, and 408 / 429 / 5xx answers.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Request { .. } => true,
            Self::Api { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            Self::InvalidResponse { .. } => false,
        }
    }
}
