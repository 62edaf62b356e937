use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Result, VisionError};
use crate::protocol::{
    multipart_boundary, ReadTextResult, StatusSnapshot, DEFAULT_BOUNDARY, READ_TEXT_ENDPOINT,
    STATUS_ENDPOINT, VIDEO_FEED_ENDPOINT,
};

/// An open video stream: the multipart boundary plus the raw body chunks.
pub struct FrameSource {
    pub boundary: String,
    pub chunks: BoxStream<'static, Result<Bytes>>,
}

/// The vision service as seen by the client tasks.
///
/// [`HttpVisionClient`] is the real implementation; tests substitute fakes.
#[async_trait]
pub trait VisionApi: Send + Sync + 'static {
    /// `GET /status`. Any non-2xx status or undecodable body is an error.
    async fn status(&self) -> Result<StatusSnapshot>;

    /// `POST /read_text`. The body is decoded whatever the HTTP status, since
    /// the service reports failures in the `status` field.
    async fn read_text(&self) -> Result<ReadTextResult>;

    /// `GET /video_feed`, left open for streaming.
    async fn video_feed(&self) -> Result<FrameSource>;
}

/// reqwest-backed [`VisionApi`].
pub struct HttpVisionClient {
    http: reqwest::Client,
    base: Url,
    timeout: Option<Duration>,
}

impl HttpVisionClient {
    /// `base` should end with a slash; endpoint names are joined onto it.
    /// `timeout` applies to status and read-text calls only.
    pub fn new(base: Url, timeout: Option<Duration>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("iris/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| VisionError::Transport {
                endpoint: "client",
                source,
            })?;
        Ok(Self {
            http,
            base,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, endpoint: &'static str) -> Result<Url> {
        Ok(self.base.join(endpoint)?)
    }

    async fn send(
        &self,
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let request = match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        };
        request
            .send()
            .await
            .map_err(|source| VisionError::Transport { endpoint, source })
    }
}

async fn decode<T: DeserializeOwned>(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<T> {
    let body = response
        .bytes()
        .await
        .map_err(|source| VisionError::Transport { endpoint, source })?;
    serde_json::from_slice(&body).map_err(|source| VisionError::Body { endpoint, source })
}

fn require_success(endpoint: &'static str, response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(VisionError::Status { endpoint, status })
    }
}

#[async_trait]
impl VisionApi for HttpVisionClient {
    async fn status(&self) -> Result<StatusSnapshot> {
        let url = self.url(STATUS_ENDPOINT)?;
        let response = self.send(STATUS_ENDPOINT, self.http.get(url)).await?;
        require_success(STATUS_ENDPOINT, &response)?;
        decode(STATUS_ENDPOINT, response).await
    }

    async fn read_text(&self) -> Result<ReadTextResult> {
        let url = self.url(READ_TEXT_ENDPOINT)?;
        let response = self.send(READ_TEXT_ENDPOINT, self.http.post(url)).await?;
        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "read_text answered with non-2xx");
        }
        decode(READ_TEXT_ENDPOINT, response).await
    }

    async fn video_feed(&self) -> Result<FrameSource> {
        let url = self.url(VIDEO_FEED_ENDPOINT)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| VisionError::Transport {
                endpoint: VIDEO_FEED_ENDPOINT,
                source,
            })?;
        require_success(VIDEO_FEED_ENDPOINT, &response)?;

        let boundary = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(multipart_boundary)
            .unwrap_or_else(|| DEFAULT_BOUNDARY.to_string());

        let chunks = response
            .bytes_stream()
            .map(|chunk| {
                chunk.map_err(|source| VisionError::Transport {
                    endpoint: VIDEO_FEED_ENDPOINT,
                    source,
                })
            })
            .boxed();

        Ok(FrameSource { boundary, chunks })
    }
}
