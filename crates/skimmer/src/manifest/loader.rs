// Manifest Loader: fetch-with-retry, redirect-aware base URL, parse and link
// resolution, with exactly one telemetry record per HTTP attempt.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{HeaderValue, USER_AGENT};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::transport::{HttpTransport, TransportRequest, TransportResponse};
use super::{LinkResolver, Manifest, ManifestEvent, ManifestParser, RequestModifier};
use crate::config::ManifestLoaderConfig;
use crate::error::{ManifestError, TransportError};
use crate::metrics::{HttpAttempt, HttpRequestType, ManifestUpdate, MetricsScope, TelemetrySink};

/// Directory of `url` with query and fragment removed, used to resolve
/// relative references inside the manifest.
pub fn base_url_of(url: &Url) -> Url {
    let mut stripped = url.clone();
    stripped.set_query(None);
    stripped.set_fragment(None);
    stripped.join(".").unwrap_or(stripped)
}

/// Reports a single HTTP attempt. Consumed by whichever outcome happens
/// first, so an attempt can never be recorded twice.
struct AttemptReport<'a> {
    telemetry: &'a dyn TelemetrySink,
    url: &'a Url,
    request_time: DateTime<Utc>,
}

impl AttemptReport<'_> {
    fn succeeded(self, response: &TransportResponse) {
        let actual_url = (response.url != *self.url).then(|| response.url.to_string());
        self.telemetry.record_http_attempt(HttpAttempt {
            scope: MetricsScope::Stream,
            request_type: HttpRequestType::Manifest,
            url: self.url.to_string(),
            actual_url,
            request_time: self.request_time,
            first_byte_time: response.first_byte_time,
            finish_time: Some(response.finish_time),
            status: Some(response.status.as_u16()),
            headers: Some(response.headers.clone()),
            traces: response.traces.clone(),
        });
    }

    fn failed(self, error: &TransportError) {
        let actual_url = error
            .response_url()
            .filter(|u| *u != self.url.as_str())
            .map(str::to_owned);
        self.telemetry.record_http_attempt(HttpAttempt {
            scope: MetricsScope::Stream,
            request_type: HttpRequestType::Manifest,
            url: self.url.to_string(),
            actual_url,
            request_time: self.request_time,
            first_byte_time: None,
            finish_time: Some(Utc::now()),
            status: error.status().map(|s| s.as_u16()),
            headers: error.response_headers().cloned(),
            traces: Vec::new(),
        });
    }
}

pub struct ManifestLoader<P: ManifestParser> {
    transport: Arc<dyn HttpTransport>,
    parser: Arc<P>,
    telemetry: Arc<dyn TelemetrySink>,
    link_resolver: Option<Arc<dyn LinkResolver<P::Document>>>,
    request_modifier: Option<Arc<dyn RequestModifier>>,
    config: ManifestLoaderConfig,
}

impl<P: ManifestParser + 'static> ManifestLoader<P> {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        parser: Arc<P>,
        telemetry: Arc<dyn TelemetrySink>,
        config: ManifestLoaderConfig,
    ) -> Self {
        Self {
            transport,
            parser,
            telemetry,
            link_resolver: None,
            request_modifier: None,
            config,
        }
    }

    pub fn with_link_resolver(mut self, resolver: Arc<dyn LinkResolver<P::Document>>) -> Self {
        self.link_resolver = Some(resolver);
        self
    }

    pub fn with_request_modifier(mut self, modifier: Arc<dyn RequestModifier>) -> Self {
        self.request_modifier = Some(modifier);
        self
    }

    /// Load `url` on a background task and publish the outcome on `events`.
    pub fn spawn_load(
        self: &Arc<Self>,
        url: String,
        events: mpsc::Sender<ManifestEvent<P::Document>>,
    ) -> JoinHandle<()> {
        let loader = Arc::clone(self);
        tokio::spawn(async move {
            let event = match loader.load(&url).await {
                Ok(manifest) => ManifestEvent::Ready(manifest),
                Err(e) => ManifestEvent::failed(&e),
            };
            if events.send(event).await.is_err() {
                debug!(url = %url, "Manifest event receiver dropped");
            }
        })
    }

    #[instrument(skip_all, fields(url = %url))]
    pub async fn load(&self, url: &str) -> Result<Manifest<P::Document>, ManifestError> {
        let url = Url::parse(url).map_err(|e| ManifestError::invalid_url(url, e.to_string()))?;
        let attempts = self.config.retry_attempts.max(1);
        let mut last_status: Option<StatusCode> = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.retry_interval).await;
            }

            let request_time = Utc::now();
            let report = AttemptReport {
                telemetry: self.telemetry.as_ref(),
                url: &url,
                request_time,
            };

            match self.transport.fetch(self.build_request(&url)).await {
                Ok(response) => {
                    report.succeeded(&response);
                    return self.complete(&url, request_time, response).await;
                }
                Err(e) => {
                    report.failed(&e);
                    last_status = e.status().or(last_status);

                    if !e.is_retryable() {
                        error!(error = %e, "Failed loading manifest, request is not retryable");
                        return Err(e.into());
                    }
                    if attempt < attempts {
                        warn!(
                            attempt,
                            remaining = attempts - attempt,
                            retry_in_ms = self.config.retry_interval.as_millis() as u64,
                            error = %e,
                            "Failed loading manifest, retrying"
                        );
                    }
                }
            }
        }

        error!(attempts, "Failed loading manifest, no retry attempts left");
        Err(ManifestError::RetriesExhausted {
            url: url.to_string(),
            attempts,
            last_status,
        })
    }

    fn build_request(&self, url: &Url) -> TransportRequest {
        let mut headers = self.config.headers.clone();
        if let Ok(agent) = HeaderValue::from_str(&self.config.user_agent) {
            headers.insert(USER_AGENT, agent);
        }

        let url = match &self.request_modifier {
            Some(modifier) => {
                modifier.modify_request_headers(&mut headers);
                modifier.modify_request_url(url)
            }
            None => url.clone(),
        };

        TransportRequest {
            url,
            headers,
            timeout: self.config.request_timeout,
        }
    }

    async fn complete(
        &self,
        url: &Url,
        request_time: DateTime<Utc>,
        response: TransportResponse,
    ) -> Result<Manifest<P::Document>, ManifestError> {
        let served_from = response.url.clone();
        if served_from != *url {
            debug!(actual_url = %served_from, "Manifest was redirected");
        }
        let base_url = base_url_of(&served_from);

        let body = String::from_utf8_lossy(&response.body);
        let parsed = self.parser.parse(&body, &base_url).map_err(|reason| {
            let err = ManifestError::parse(url.as_str(), reason);
            error!(error = %err, "Manifest parsing failed");
            err
        })?;

        let manifest = Manifest {
            url: served_from,
            base_url,
            loaded_time: response.finish_time,
            kind: parsed.kind,
            availability_start_time: parsed.availability_start_time,
            document: parsed.document,
        };

        self.telemetry.record_manifest_update(ManifestUpdate {
            kind: manifest.kind,
            request_time,
            fetch_time: manifest.loaded_time,
            availability_start_time: manifest.availability_start_time,
        });

        let manifest = match &self.link_resolver {
            Some(resolver) => resolver.resolve_on_load(manifest).await.map_err(|reason| {
                let err = ManifestError::LinkResolution {
                    url: url.to_string(),
                    reason,
                };
                error!(error = %err, "Manifest link resolution failed");
                err
            })?,
            None => manifest,
        };

        info!(
            actual_url = %manifest.url,
            base_url = %manifest.base_url,
            kind = ?manifest.kind,
            "Manifest ready"
        );
        Ok(manifest)
    }
}
