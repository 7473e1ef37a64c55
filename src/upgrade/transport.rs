//! HTTP seam used by the fetcher and the install pipeline.
//!
//! [`HttpTransport`] is the only way the updater talks to the network, so the
//! whole check/install state machine can run against a fake in tests.
//! [`ReqwestTransport`] is the production implementation.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::constants::DOWNLOAD_TIMEOUT;
use crate::core::{Result, UpdateError};

/// Download progress callback: `(bytes_so_far, total_if_known)`.
pub type ProgressFn<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// A GET request for release metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    /// Absolute URL.
    pub url: String,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// Request for `url` with no extra headers.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A buffered response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers, names lowercased.
    pub headers: HashMap<String, String>,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// `true` for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network access used by the updater.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform a GET and buffer the response. Non-2xx statuses are returned,
    /// not turned into errors; only transport failures are errors.
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse>;

    /// Stream `url` into `dest`. Fails with [`UpdateError::Http`] on a non-2xx
    /// status. Returns the number of bytes written.
    async fn download(&self, url: &str, dest: &Path, progress: ProgressFn<'_>) -> Result<u64>;
}

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client with the given user agent and request timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| UpdateError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse> {
        debug!("GET {}", request.url);

        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| UpdateError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| UpdateError::Transport(e.to_string()))?
            .to_vec();

        debug!("GET {} -> {}", request.url, status);
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn download(&self, url: &str, dest: &Path, progress: ProgressFn<'_>) -> Result<u64> {
        debug!("Downloading {} to {}", url, dest.display());

        let response = self
            .client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| UpdateError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(UpdateError::Http {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let total = response.content_length();
        let mut file =
            tokio::fs::File::create(dest).await.map_err(|e| UpdateError::io("create", dest, &e))?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| UpdateError::Transport(e.to_string()))?;
            file.write_all(&chunk).await.map_err(|e| UpdateError::io("write", dest, &e))?;
            written += chunk.len() as u64;
            progress(written, total);
        }

        file.flush().await.map_err(|e| UpdateError::io("flush", dest, &e))?;
        debug!("Downloaded {} bytes from {}", written, url);
        Ok(written)
    }
}
