use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use retouch_core::error::CoreError;
use retouch_pipeline::PipelineError;
use retouch_upstream::UpstreamError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the library errors and adds HTTP-specific variants. Implements
/// [`IntoResponse`] to produce consistent `{error, code}` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `retouch_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A third-party backend failed or misbehaved.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Core(e) => Self::Core(e),
            PipelineError::Upstream(e) => Self::Upstream(e),
            PipelineError::Storage(e) => Self::Database(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            // --- Backend failures carry their own body shape ---
            AppError::Upstream(err) => return upstream_response(err),

            // --- Database errors ---
            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                internal()
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Timeouts map to 504; every other backend failure maps to 502 and
/// carries the backend's own status when it answered.
fn upstream_response(err: &UpstreamError) -> Response {
    tracing::error!(backend = err.backend(), error = %err, "Upstream failure");

    let (status, code) = match err {
        UpstreamError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT"),
        _ => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
    };

    let mut body = json!({
        "error": err.to_string(),
        "code": code,
    });
    if let Some(upstream_status) = err.status() {
        body["upstream_status"] = json!(upstream_status);
    }

    (status, axum::Json(body)).into_response()
}
