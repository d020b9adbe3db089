// Shared fakes for unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use tokio::time::Instant;
use url::Url;

use crate::error::TransportError;
use crate::manifest::{HttpTransport, TransportRequest, TransportResponse};
use crate::scheduler::{
    BufferAccessor, FragmentRequest, MediaType, PlaybackController, RepresentationIndex,
    RequestOptions, RequestQueue, RequestState, StagedFragment, TimeRange,
};

/// Initialize tracing for tests with appropriate settings
#[inline]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Uniform segment index: segment `i` covers `[i * d, (i + 1) * d)`.
pub struct FakeIndex {
    media_type: MediaType,
    segment_duration: f64,
    count: u64,
    boundary_drift: Mutex<f64>,
    cursor: Mutex<Option<u64>>,
    lookups: Mutex<Vec<(f64, RequestOptions)>>,
}

impl FakeIndex {
    pub fn new(media_type: MediaType, segment_duration: f64, count: u64) -> Self {
        Self {
            media_type,
            segment_duration,
            count,
            boundary_drift: Mutex::new(0.0),
            cursor: Mutex::new(None),
            lookups: Mutex::new(Vec::new()),
        }
    }

    /// Shift every lookup by `drift` seconds to simulate rounding at segment
    /// boundaries.
    pub fn set_boundary_drift(&self, drift: f64) {
        *self.boundary_drift.lock() = drift;
    }

    /// Times (before drift) and options of every time lookup so far.
    pub fn lookups(&self) -> Vec<(f64, RequestOptions)> {
        self.lookups.lock().clone()
    }

    pub fn resolved_with_keep_index(&self) -> bool {
        self.lookups.lock().iter().any(|(_, o)| o.keep_index)
    }

    fn request_at(&self, index: u64) -> FragmentRequest {
        if index >= self.count {
            FragmentRequest::complete(self.media_type, index)
        } else {
            FragmentRequest::new(
                self.media_type,
                index,
                index as f64 * self.segment_duration,
                self.segment_duration,
            )
        }
    }
}

impl RepresentationIndex for FakeIndex {
    fn fragment_request_for_time(
        &self,
        time: f64,
        options: RequestOptions,
    ) -> Option<FragmentRequest> {
        self.lookups.lock().push((time, options));
        if !time.is_finite() {
            return None;
        }
        let drifted = time + *self.boundary_drift.lock();
        let index = (drifted / self.segment_duration).floor().max(0.0) as u64;
        if !options.keep_index {
            *self.cursor.lock() = Some(index);
        }
        Some(self.request_at(index))
    }

    fn next_fragment_request(&self) -> Option<FragmentRequest> {
        let mut cursor = self.cursor.lock();
        let next = cursor.map_or(0, |c| c + 1);
        *cursor = Some(next);
        Some(self.request_at(next))
    }
}

#[derive(Default)]
pub struct FakeQueue {
    requests: Mutex<Vec<(RequestState, FragmentRequest)>>,
    cancellations: Mutex<usize>,
}

impl FakeQueue {
    pub fn push(&self, state: RequestState, request: FragmentRequest) {
        self.requests.lock().push((state, request));
    }

    pub fn by_state(&self, state: RequestState) -> Vec<FragmentRequest> {
        self.requests_by_state(state)
    }

    pub fn cancellations(&self) -> usize {
        *self.cancellations.lock()
    }
}

impl RequestQueue for FakeQueue {
    fn requests_by_state(&self, state: RequestState) -> Vec<FragmentRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|(s, _)| *s == state)
            .map(|(_, r)| r.clone())
            .collect()
    }

    fn remove_rejected(&self, request: &FragmentRequest) {
        self.requests
            .lock()
            .retain(|(s, r)| !(*s == RequestState::Rejected && r.index == request.index));
    }

    fn is_loaded_or_pending(&self, request: &FragmentRequest) -> bool {
        self.requests.lock().iter().any(|(s, r)| {
            matches!(
                s,
                RequestState::Pending | RequestState::Loading | RequestState::Executed
            ) && r.media_type == request.media_type
                && r.index == request.index
        })
    }

    fn cancel_pending(&self) {
        *self.cancellations.lock() += 1;
        self.requests
            .lock()
            .retain(|(s, _)| !matches!(s, RequestState::Pending | RequestState::Rejected));
    }
}

pub struct FakeBuffer {
    ranges: Vec<TimeRange>,
    staged: Vec<StagedFragment>,
}

impl FakeBuffer {
    pub fn new(ranges: Vec<TimeRange>, staged: Vec<StagedFragment>) -> Self {
        Self { ranges, staged }
    }
}

impl BufferAccessor for FakeBuffer {
    fn buffer_range_containing(&self, time: f64) -> Option<TimeRange> {
        self.ranges.iter().copied().find(|r| r.contains(time))
    }

    fn staged_fragments_in_range(&self, range: TimeRange) -> Vec<StagedFragment> {
        self.staged
            .iter()
            .filter(|f| f.buffered_range.start >= range.start && f.buffered_range.end <= range.end)
            .cloned()
            .collect()
    }
}

#[derive(Default)]
pub struct FakePlayback {
    time: Mutex<f64>,
    seeks: Mutex<Vec<f64>>,
}

impl FakePlayback {
    pub fn at(time: f64) -> Self {
        Self {
            time: Mutex::new(time),
            seeks: Mutex::new(Vec::new()),
        }
    }

    pub fn set_time(&self, time: f64) {
        *self.time.lock() = time;
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.seeks.lock().clone()
    }
}

impl PlaybackController for FakePlayback {
    fn current_time(&self) -> f64 {
        *self.time.lock()
    }

    fn seek(&self, time: f64) {
        self.seeks.lock().push(time);
        *self.time.lock() = time;
    }
}

/// Plays back a fixed list of outcomes, one per fetch.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    calls: Mutex<Vec<(Instant, TransportRequest)>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<TransportResponse, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|(at, _)| *at).collect()
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.calls.lock().iter().map(|(_, r)| r.clone()).collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn fetch(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = request.url.to_string();
        self.calls.lock().push((Instant::now(), request));
        self.script
            .lock()
            .pop_front()
            .unwrap_or(Err(TransportError::Connect {
                url,
                reason: "script exhausted".to_string(),
            }))
    }
}

/// A 200 response served from `final_url`.
pub fn ok_response(final_url: &str, body: &str) -> TransportResponse {
    TransportResponse {
        status: StatusCode::OK,
        url: Url::parse(final_url).unwrap(),
        headers: HeaderMap::new(),
        body: Bytes::from(body.to_owned()),
        first_byte_time: None,
        finish_time: Utc::now(),
        traces: Vec::new(),
    }
}
