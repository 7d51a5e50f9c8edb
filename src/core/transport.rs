use crate::core::model::{FileDescriptor, UploadMeta};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Fractional progress callback, 0-100. Implementations may call it from the
/// middle of a request body stream; the controller enforces monotonicity.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

#[derive(thiserror::Error, Debug, Clone)]
pub enum UploadError {
    /// No response received at all (connect failure, timeout, broken body).
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response; `message` is parsed from the body when the server
    /// sends a structured error, otherwise a generic status-code message.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
}

/// Terminal result of one upload attempt. Cancellation resolves here as a
/// normal completion, never as an error.
#[derive(Debug, Clone)]
pub enum TransportOutcome {
    Completed(String),
    Failed(UploadError),
    Cancelled,
}

#[async_trait]
pub trait UploadTransport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Performs one upload attempt for `payload`, streaming fractional
    /// progress through `progress` and honoring `cancel` cooperatively.
    async fn upload(
        &self,
        payload: &FileDescriptor,
        meta: &UploadMeta,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> TransportOutcome;
}
