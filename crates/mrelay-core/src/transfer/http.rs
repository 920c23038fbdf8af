//! HTTP byte source and metadata probe (reqwest, streaming).

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::StatusCode;

use crate::error::RelayError;

use super::ByteSource;

/// Streaming GET over a direct media URL.
pub struct HttpSource {
    stream: BoxStream<'static, reqwest::Result<Bytes>>,
    content_length: Option<u64>,
}

impl HttpSource {
    /// Opens the request and checks the status. `timeout` bounds the
    /// connect/header phase; per-chunk read deadlines are the engine's job.
    pub async fn open(
        client: &reqwest::Client,
        url: &str,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let response = tokio::time::timeout(timeout, client.get(url).send())
            .await
            .map_err(|_| RelayError::Timeout)?
            .map_err(classify_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let content_length = response.content_length();
        Ok(Self {
            stream: response.bytes_stream().boxed(),
            content_length,
        })
    }

    /// `Content-Length` of the response, if the server sent one.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RelayError> {
        match self.stream.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(classify_reqwest(e)),
            None => Ok(None),
        }
    }
}

/// Result of a HEAD probe: the metadata needed before downloading.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
}

/// HEAD request for size and media type. Used when the resolver's size hint
/// is absent. Probe failures are transport-class (retryable upstream).
pub async fn probe(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<ProbeResult, RelayError> {
    let response = tokio::time::timeout(timeout, client.head(url).send())
        .await
        .map_err(|_| RelayError::Timeout)?
        .map_err(classify_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        return Err(classify_status(status));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

    Ok(ProbeResult {
        content_length: response.content_length(),
        content_type,
    })
}

/// Timeouts stay timeouts; everything else reqwest reports is transport.
fn classify_reqwest(e: reqwest::Error) -> RelayError {
    if e.is_timeout() {
        RelayError::Timeout
    } else {
        RelayError::Transport(e.to_string())
    }
}

/// 429/5xx are worth retrying; any other non-success on a direct media URL
/// means the resolved link is bad (expired, gone), which is terminal.
fn classify_status(status: StatusCode) -> RelayError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        RelayError::Transport(format!("HTTP {status}"))
    } else {
        RelayError::Resolution(format!("direct link returned HTTP {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(classify_status(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE).is_retryable());
    }

    #[test]
    fn client_errors_are_terminal() {
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND),
            RelayError::Resolution(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN),
            RelayError::Resolution(_)
        ));
    }
}
