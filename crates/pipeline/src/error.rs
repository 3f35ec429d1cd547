use retouch_core::error::CoreError;
use retouch_upstream::UpstreamError;

/// Failure of a pipeline operation, classified by where it originated.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}
