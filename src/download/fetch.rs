//! Byte transfer from a resolved stream URL.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::StatusCode;

use crate::extraction::ResolvedStream;
use crate::extraction::transport::USER_AGENT;

/// Errors while transferring bytes
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Stream request failed: {0}")]
    Network(String),

    /// The URL is no longer (or was never) valid
    #[error("Stream gone: HTTP {0}")]
    Gone(u16),

    #[error("Stream rejected: HTTP {0}")]
    Rejected(u16),
}

/// An open body: its announced length and a chunk stream.
pub struct ByteBody {
    pub len: Option<u64>,
    pub chunks: BoxStream<'static, Result<Vec<u8>, FetchError>>,
}

/// Opens resolved streams for reading.
#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn open(&self, stream: &ResolvedStream) -> Result<ByteBody, FetchError>;
}

/// Streams bodies over HTTP.
pub struct HttpByteSource {
    client: reqwest::Client,
}

impl HttpByteSource {
    /// Only connecting is bounded here; the whole transfer is bounded by
    /// the orchestrator's per-attempt timeout.
    pub fn new(connect_timeout: Duration, user_agent: Option<&str>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.unwrap_or(USER_AGENT))
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn open(&self, stream: &ResolvedStream) -> Result<ByteBody, FetchError> {
        let response = self
            .client
            .get(&stream.url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::NOT_FOUND | StatusCode::GONE | StatusCode::FORBIDDEN => FetchError::Gone(status.as_u16()),
                _ => FetchError::Rejected(status.as_u16()),
            });
        }

        let len = response.content_length();
        let chunks = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| FetchError::Network(e.to_string()))
            })
            .boxed();

        Ok(ByteBody { len, chunks })
    }
}

#[cfg(test)]
pub mod mocks {
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::*;

    /// Serves fixed bodies by URL; unknown URLs are `Gone(404)`.
    #[derive(Default)]
    pub struct MockByteSource {
        pub bodies: HashMap<String, Vec<Vec<u8>>>,
        /// Fail after the chunks of this URL are served
        pub fail_after: HashMap<String, FetchError>,
        /// Advertise no content length
        pub hide_length: bool,
        /// Pause between chunks
        pub chunk_delay: Option<Duration>,
        pub opened: Mutex<Vec<String>>,
    }

    impl MockByteSource {
        pub fn serving(url: &str, chunks: Vec<Vec<u8>>) -> Self {
            let mut source = Self::default();
            source.bodies.insert(url.to_string(), chunks);
            source
        }

        pub fn failing_after(mut self, url: &str, error: FetchError) -> Self {
            self.fail_after.insert(url.to_string(), error);
            self
        }

        pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
            self.chunk_delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl ByteSource for MockByteSource {
        async fn open(&self, stream: &ResolvedStream) -> Result<ByteBody, FetchError> {
            self.opened.lock().push(stream.url.clone());
            let Some(chunks) = self.bodies.get(&stream.url).cloned() else {
                return Err(FetchError::Gone(404));
            };
            let len = (!self.hide_length).then(|| chunks.iter().map(|c| c.len() as u64).sum());
            let tail = self.fail_after.get(&stream.url).cloned();
            let delay = self.chunk_delay;

            let items = chunks
                .into_iter()
                .map(Ok)
                .chain(tail.map(Err))
                .collect::<Vec<_>>();
            let chunks = futures::stream::iter(items)
                .then(move |item| async move {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    item
                })
                .boxed();
            Ok(ByteBody { len, chunks })
        }
    }
}
