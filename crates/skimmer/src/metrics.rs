// Telemetry: observer interface for HTTP attempts, manifest updates and
// scheduling activity, plus an in-memory store implementing it.

use crate::manifest::ManifestKind;
use crate::scheduler::{FragmentRequest, MediaType, RequestState};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use tracing::trace;

/// Which bucket a record belongs to: the stream as a whole (manifest traffic)
/// or a single media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricsScope {
    Stream,
    Track(MediaType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRequestType {
    Manifest,
    InitSegment,
    MediaSegment,
    Other,
}

/// One progress sample of a transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceSample {
    /// When the sampled interval started
    pub start: DateTime<Utc>,
    pub duration_ms: i64,
    /// Bytes received during the interval
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct HttpAttempt {
    pub scope: MetricsScope,
    pub request_type: HttpRequestType,
    pub url: String,
    /// Resource actually served, when it differs from `url` (redirects)
    pub actual_url: Option<String>,
    pub request_time: DateTime<Utc>,
    pub first_byte_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub status: Option<u16>,
    pub headers: Option<HeaderMap>,
    pub traces: Vec<TraceSample>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestUpdate {
    pub kind: ManifestKind,
    pub request_time: DateTime<Utc>,
    pub fetch_time: DateTime<Utc>,
    pub availability_start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingInfo {
    pub media_type: MediaType,
    pub time: DateTime<Utc>,
    pub request_type: HttpRequestType,
    pub start_time: f64,
    pub duration: f64,
    pub quality: u32,
    pub index: u64,
    pub state: RequestState,
}

impl SchedulingInfo {
    pub fn for_request(request: &FragmentRequest, state: RequestState) -> Self {
        Self {
            media_type: request.media_type,
            time: Utc::now(),
            request_type: HttpRequestType::MediaSegment,
            start_time: request.start_time,
            duration: request.duration,
            quality: request.quality,
            index: request.index,
            state,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestQueueState {
    pub pending: Vec<FragmentRequest>,
    pub loading: Vec<FragmentRequest>,
    pub executed: Vec<FragmentRequest>,
    pub rejected: Vec<FragmentRequest>,
}

/// Receives telemetry records. Implementations must not influence scheduling.
pub trait TelemetrySink: Send + Sync {
    fn record_http_attempt(&self, attempt: HttpAttempt);

    fn record_manifest_update(&self, update: ManifestUpdate);

    fn record_scheduling_info(&self, info: SchedulingInfo);

    fn record_request_queue_state(&self, media_type: MediaType, state: RequestQueueState);
}

#[derive(Debug, Default)]
struct ScopeMetrics {
    http_requests: Vec<HttpAttempt>,
    manifest_updates: Vec<ManifestUpdate>,
    scheduling_info: Vec<SchedulingInfo>,
    request_queue: Option<RequestQueueState>,
}

/// In-memory telemetry model.
///
/// Redirected requests are stored as a chain: one entry for the request as
/// issued (no response data) followed by the entry for the resource actually
/// served, carrying `actual_url`. Both share the same `url`.
#[derive(Debug, Default)]
pub struct MetricsStore {
    scopes: Mutex<HashMap<MetricsScope, ScopeMetrics>>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn http_requests(&self, scope: MetricsScope) -> Vec<HttpAttempt> {
        self.scopes
            .lock()
            .get(&scope)
            .map(|m| m.http_requests.clone())
            .unwrap_or_default()
    }

    pub fn manifest_updates(&self) -> Vec<ManifestUpdate> {
        self.scopes
            .lock()
            .get(&MetricsScope::Stream)
            .map(|m| m.manifest_updates.clone())
            .unwrap_or_default()
    }

    pub fn scheduling_info(&self, media_type: MediaType) -> Vec<SchedulingInfo> {
        self.scopes
            .lock()
            .get(&MetricsScope::Track(media_type))
            .map(|m| m.scheduling_info.clone())
            .unwrap_or_default()
    }

    pub fn request_queue(&self, media_type: MediaType) -> Option<RequestQueueState> {
        self.scopes
            .lock()
            .get(&MetricsScope::Track(media_type))
            .and_then(|m| m.request_queue.clone())
    }

    pub fn clear(&self) {
        self.scopes.lock().clear();
    }
}

impl TelemetrySink for MetricsStore {
    fn record_http_attempt(&self, attempt: HttpAttempt) {
        let mut scopes = self.scopes.lock();
        let metrics = scopes.entry(attempt.scope).or_default();

        if let Some(actual_url) = &attempt.actual_url
            && *actual_url != attempt.url
        {
            trace!(url = %attempt.url, actual_url = %actual_url, "Recording redirect chain");
            metrics.http_requests.push(HttpAttempt {
                scope: attempt.scope,
                request_type: attempt.request_type,
                url: attempt.url.clone(),
                actual_url: None,
                request_time: attempt.request_time,
                first_byte_time: None,
                finish_time: None,
                status: None,
                headers: None,
                traces: Vec::new(),
            });
        }
        metrics.http_requests.push(attempt);
    }

    fn record_manifest_update(&self, update: ManifestUpdate) {
        self.scopes
            .lock()
            .entry(MetricsScope::Stream)
            .or_default()
            .manifest_updates
            .push(update);
    }

    fn record_scheduling_info(&self, info: SchedulingInfo) {
        self.scopes
            .lock()
            .entry(MetricsScope::Track(info.media_type))
            .or_default()
            .scheduling_info
            .push(info);
    }

    fn record_request_queue_state(&self, media_type: MediaType, state: RequestQueueState) {
        self.scopes
            .lock()
            .entry(MetricsScope::Track(media_type))
            .or_default()
            .request_queue = Some(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(url: &str, actual_url: Option<&str>) -> HttpAttempt {
        HttpAttempt {
            scope: MetricsScope::Stream,
            request_type: HttpRequestType::Manifest,
            url: url.to_string(),
            actual_url: actual_url.map(str::to_string),
            request_time: Utc::now(),
            first_byte_time: None,
            finish_time: Some(Utc::now()),
            status: Some(200),
            headers: None,
            traces: vec![TraceSample {
                start: Utc::now(),
                duration_ms: 12,
                bytes: 512,
            }],
        }
    }

    #[test]
    fn redirect_is_recorded_as_two_linked_entries() {
        let store = MetricsStore::new();
        store.record_http_attempt(attempt(
            "http://origin/live.mpd",
            Some("http://edge/live.mpd"),
        ));

        let records = store.http_requests(MetricsScope::Stream);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].url, "http://origin/live.mpd");
        assert_eq!(records[0].actual_url, None);
        assert_eq!(records[0].status, None);
        assert!(records[0].traces.is_empty());
        assert_eq!(records[1].url, "http://origin/live.mpd");
        assert_eq!(records[1].actual_url.as_deref(), Some("http://edge/live.mpd"));
        assert_eq!(records[1].status, Some(200));
    }

    #[test]
    fn same_actual_url_is_not_a_redirect() {
        let store = MetricsStore::new();
        store.record_http_attempt(attempt("http://a/x.mpd", Some("http://a/x.mpd")));
        store.record_http_attempt(attempt("http://a/x.mpd", None));
        assert_eq!(store.http_requests(MetricsScope::Stream).len(), 2);
    }

    #[test]
    fn request_queue_keeps_latest_snapshot_per_track() {
        let store = MetricsStore::new();
        let pending = FragmentRequest::new(MediaType::Video, 3, 6.0, 2.0);
        store.record_request_queue_state(
            MediaType::Video,
            RequestQueueState {
                pending: vec![pending.clone()],
                ..Default::default()
            },
        );
        store.record_request_queue_state(MediaType::Video, RequestQueueState::default());

        assert_eq!(
            store.request_queue(MediaType::Video),
            Some(RequestQueueState::default())
        );
        assert_eq!(store.request_queue(MediaType::Audio), None);

        store.record_scheduling_info(SchedulingInfo::for_request(
            &pending,
            RequestState::Pending,
        ));
        assert_eq!(store.scheduling_info(MediaType::Video).len(), 1);
        assert!(store.scheduling_info(MediaType::Audio).is_empty());
    }
}
