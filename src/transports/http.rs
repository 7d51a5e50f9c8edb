use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use sanitize_filename::sanitize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::core::model::{FileDescriptor, UploadMeta};
use crate::core::transport::{ProgressFn, TransportOutcome, UploadError, UploadTransport};

/// Granularity of the progress-counting body stream.
const PROGRESS_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub endpoint: Url,
    pub timeout_secs: u64,
    pub user_agent: String,
}

pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpTransportConfig,
}

#[derive(serde::Deserialize)]
struct ServerErrorBody {
    message: String,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(config.user_agent.clone())
            .build()
            .expect("reqwest client");
        Self { client, config }
    }

    /// Non-2xx bodies may carry a structured `{"message": ...}`; fall back to
    /// a generic status-code message otherwise.
    pub(crate) fn parse_server_message(status: u16, body: &str) -> String {
        serde_json::from_str::<ServerErrorBody>(body)
            .map(|e| e.message)
            .unwrap_or_else(|_| format!("upload failed with status {}", status))
    }

    pub(crate) fn split_chunks(data: Bytes) -> Vec<Bytes> {
        let mut out = Vec::with_capacity(data.len() / PROGRESS_CHUNK + 1);
        let mut rest = data;
        while rest.len() > PROGRESS_CHUNK {
            out.push(rest.split_to(PROGRESS_CHUNK));
        }
        out.push(rest);
        out
    }

    /// Wraps the payload in a chunked stream that reports fractional byte
    /// progress as the connection pulls each chunk.
    fn progress_body(data: Bytes, progress: ProgressFn) -> reqwest::Body {
        let total = data.len().max(1) as u64;
        let mut sent: u64 = 0;
        let chunks = Self::split_chunks(data);
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            progress(((sent * 100) / total) as u8);
            Ok::<Bytes, std::io::Error>(chunk)
        }));
        reqwest::Body::wrap_stream(stream)
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "http-multipart"
    }

    async fn upload(
        &self,
        payload: &FileDescriptor,
        meta: &UploadMeta,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> TransportOutcome {
        let data = match tokio::fs::read(&payload.path).await {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                return TransportOutcome::Failed(UploadError::Network(format!(
                    "failed to read {}: {}",
                    payload.path.display(),
                    e
                )))
            }
        };
        let len = data.len() as u64;

        let part = match Part::stream_with_length(Self::progress_body(data, progress), len)
            .file_name(sanitize(&meta.original_name))
            .mime_str(&payload.mime)
        {
            Ok(part) => part,
            Err(e) => {
                return TransportOutcome::Failed(UploadError::Network(format!(
                    "invalid mime type {}: {}",
                    payload.mime, e
                )))
            }
        };

        let form = Form::new()
            .part("file", part)
            .text("category", meta.category.clone())
            .text("originalName", meta.original_name.clone())
            .text("timestamp", meta.timestamp.to_rfc3339());

        let request = self
            .client
            .post(self.config.endpoint.clone())
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .multipart(form)
            .send();

        // dropping the in-flight future aborts the connection; the call
        // still resolves normally so the controller sees a completion
        let sent = tokio::select! {
            _ = cancel.cancelled() => return TransportOutcome::Cancelled,
            sent = request => sent,
        };

        match sent {
            Ok(resp) if resp.status().is_success() => {
                let body = resp.text().await.unwrap_or_default();
                TransportOutcome::Completed(body)
            }
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                TransportOutcome::Failed(UploadError::Server {
                    status,
                    message: Self::parse_server_message(status, &body),
                })
            }
            // timeouts land here too: just another failure path
            Err(e) if e.is_timeout() => TransportOutcome::Failed(UploadError::Network(
                format!("request timed out: {}", e),
            )),
            Err(e) => TransportOutcome::Failed(UploadError::Network(format!(
                "no response from server: {}",
                e
            ))),
        }
    }
}
