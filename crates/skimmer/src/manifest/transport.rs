// HTTP transport used for manifest requests.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use super::progress::ProgressTracker;
use crate::config::{DEFAULT_MAX_BODY_SIZE, ManifestLoaderConfig};
use crate::error::TransportError;
use crate::metrics::TraceSample;

/// Upper bound on the buffer reserved up front from `Content-Length`.
const MAX_PREALLOC: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: Url,
    pub headers: HeaderMap,
    pub timeout: Duration,
}

/// A completed 2xx exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    /// Final URL after following redirects
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub first_byte_time: Option<DateTime<Utc>>,
    pub finish_time: DateTime<Utc>,
    pub traces: Vec<TraceSample>,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform a GET. Non-2xx responses are reported as `TransportError::Status`.
    async fn fetch(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Install the process-wide rustls crypto provider once.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

pub struct ReqwestTransport {
    client: Client,
    max_body_size: u64,
}

impl ReqwestTransport {
    pub fn new(config: &ManifestLoaderConfig) -> Result<Self, TransportError> {
        install_rustls_provider();
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(config.headers.clone())
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Request {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            max_body_size: config.max_body_size,
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn with_max_body_size(mut self, max_body_size: u64) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    fn oversized(&self, url: &Url, received: u64, size: u64) -> TransportError {
        TransportError::Body {
            url: url.to_string(),
            received,
            reason: format!("body of {size} bytes exceeds limit of {}", self.max_body_size),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let request_time = Utc::now();
        let response = self
            .client
            .get(request.url.clone())
            .headers(request.headers)
            .timeout(request.timeout)
            .send()
            .await?;

        let status = response.status();
        let final_url = response.url().clone();
        if !status.is_success() {
            return Err(TransportError::Status {
                status,
                url: final_url.to_string(),
                headers: Some(Box::new(response.headers().clone())),
            });
        }

        let headers = response.headers().clone();
        let total = response.content_length();
        if let Some(total) = total
            && total > self.max_body_size
        {
            return Err(self.oversized(&final_url, 0, total));
        }
        let mut progress = ProgressTracker::new(request_time, total);
        let mut body = BytesMut::with_capacity(total.map_or(0, |t| t.min(MAX_PREALLOC)) as usize);

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransportError::Body {
                url: final_url.to_string(),
                received: progress.loaded(),
                reason: e.to_string(),
            })?;
            let size = progress.loaded() + chunk.len() as u64;
            if size > self.max_body_size {
                return Err(self.oversized(&final_url, progress.loaded(), size));
            }
            progress.on_progress(Utc::now(), chunk.len() as u64);
            body.extend_from_slice(&chunk);
        }

        let report = progress.finish();
        trace!(
            url = %final_url,
            bytes = report.loaded,
            samples = report.traces.len(),
            "Manifest transfer complete"
        );

        Ok(TransportResponse {
            status,
            url: final_url,
            headers,
            body: body.freeze(),
            first_byte_time: report.first_byte_time,
            finish_time: Utc::now(),
            traces: report.traces,
        })
    }
}
