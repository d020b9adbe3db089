use super::track::{BufferAccessor, RepresentationIndex, RequestQueue};
use super::types::MediaType;
use std::fmt;
use std::sync::Arc;

/// Identifies one (stream, media type) pair attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackKey {
    pub stream_id: Arc<str>,
    pub media_type: MediaType,
}

impl TrackKey {
    pub fn new(stream_id: impl Into<Arc<str>>, media_type: MediaType) -> Self {
        Self {
            stream_id: stream_id.into(),
            media_type,
        }
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stream_id, self.media_type)
    }
}

/// Per-track scheduling state plus handles to the track's collaborators.
///
/// Created when a track is attached to a session and dropped when it is
/// detached. The scheduler mutates it only through `&mut`, so a decision and
/// the state update derived from it are always applied together.
pub struct SchedulingContext {
    key: TrackKey,
    /// Timeline position up to which requests were committed. `None` means
    /// unknown, e.g. after the index was exhausted.
    index_handler_time: Option<f64>,
    index: Arc<dyn RepresentationIndex>,
    requests: Arc<dyn RequestQueue>,
    buffer: Option<Arc<dyn BufferAccessor>>,
    all_variants_disabled: bool,
}

impl SchedulingContext {
    pub fn new(
        key: TrackKey,
        index: Arc<dyn RepresentationIndex>,
        requests: Arc<dyn RequestQueue>,
    ) -> Self {
        Self {
            key,
            index_handler_time: None,
            index,
            requests,
            buffer: None,
            all_variants_disabled: false,
        }
    }

    pub fn with_buffer(mut self, buffer: Arc<dyn BufferAccessor>) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn with_start_time(mut self, time: f64) -> Self {
        self.set_index_handler_time(Some(time));
        self
    }

    pub fn key(&self) -> &TrackKey {
        &self.key
    }

    pub fn media_type(&self) -> MediaType {
        self.key.media_type
    }

    pub fn index_handler_time(&self) -> Option<f64> {
        self.index_handler_time
    }

    /// NaN is normalised to "unknown".
    pub fn set_index_handler_time(&mut self, time: Option<f64>) {
        self.index_handler_time = time.filter(|t| !t.is_nan());
    }

    pub fn index(&self) -> &dyn RepresentationIndex {
        self.index.as_ref()
    }

    /// Swap the representation, e.g. after a quality switch or a manifest
    /// refresh. The committed position is kept.
    pub fn replace_index(&mut self, index: Arc<dyn RepresentationIndex>) {
        self.index = index;
    }

    pub fn requests(&self) -> &dyn RequestQueue {
        self.requests.as_ref()
    }

    pub fn buffer(&self) -> Option<&dyn BufferAccessor> {
        self.buffer.as_deref()
    }

    /// Only meaningful for text tracks: every text variant is switched off.
    pub fn set_all_variants_disabled(&mut self, disabled: bool) {
        self.all_variants_disabled = disabled;
    }

    pub fn is_disabled(&self) -> bool {
        self.key.media_type == MediaType::FragmentedText && self.all_variants_disabled
    }
}

impl fmt::Debug for SchedulingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulingContext")
            .field("key", &self.key)
            .field("index_handler_time", &self.index_handler_time)
            .field("has_buffer", &self.buffer.is_some())
            .field("all_variants_disabled", &self.all_variants_disabled)
            .finish()
    }
}
