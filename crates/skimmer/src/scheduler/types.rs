use std::fmt;

/// Kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaType {
    Video,
    Audio,
    FragmentedText,
}

impl MediaType {
    pub const ALL: [MediaType; 3] = [MediaType::Video, MediaType::Audio, MediaType::FragmentedText];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::FragmentedText => "fragmentedText",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the fragment loader should do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestAction {
    #[default]
    Download,
    /// Sentinel returned once the representation index is exhausted.
    Complete,
}

/// Lifecycle state of a request inside the external request queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    Pending,
    Loading,
    Executed,
    Rejected,
}

/// One retrievable media segment.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentRequest {
    pub media_type: MediaType,
    pub start_time: f64,
    pub duration: f64,
    /// Position of the segment in its representation
    pub index: u64,
    pub quality: u32,
    pub url: Option<String>,
    pub action: RequestAction,
}

impl FragmentRequest {
    pub fn new(media_type: MediaType, index: u64, start_time: f64, duration: f64) -> Self {
        Self {
            media_type,
            start_time,
            duration,
            index,
            quality: 0,
            url: None,
            action: RequestAction::Download,
        }
    }

    /// Sentinel marking the end of the representation index.
    pub fn complete(media_type: MediaType, index: u64) -> Self {
        Self {
            action: RequestAction::Complete,
            ..Self::new(media_type, index, f64::NAN, 0.0)
        }
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    pub fn is_complete(&self) -> bool {
        self.action == RequestAction::Complete
    }
}

/// How strongly downstream consumers must honour a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Default,
    /// Authoritative jump (seek) that must not be reprioritised.
    Strong,
}

/// Why a decision carries no request. A stall is a valid outcome, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallReason {
    /// Enough interesting content is already buffered ahead of the playhead.
    Backpressure,
    /// The candidate time is unknown or not a number.
    InvalidTime,
    /// Text track whose variants are all disabled.
    TrackDisabled,
    /// The representation index has no further segments.
    IndexExhausted,
    /// The index returned nothing for the candidate time.
    NoRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingDecision {
    pub request: Option<FragmentRequest>,
    pub priority: Priority,
    pub stall: Option<StallReason>,
}

impl SchedulingDecision {
    pub fn request(request: FragmentRequest, priority: Priority) -> Self {
        Self {
            request: Some(request),
            priority,
            stall: None,
        }
    }

    pub fn stall(reason: StallReason, priority: Priority) -> Self {
        Self {
            request: None,
            priority,
            stall: Some(reason),
        }
    }

    pub fn is_stall(&self) -> bool {
        self.request.is_none()
    }
}

/// A contiguous buffered time range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }
}

/// A fragment already appended to the playback buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedFragment {
    pub index: u64,
    pub buffered_range: TimeRange,
}

/// Options forwarded to the representation index when resolving a time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RequestOptions {
    /// Keep the index cursor where it is instead of moving it to the result.
    pub keep_index: bool,
    /// Tolerance used when matching `time` to a segment boundary; `None`
    /// lets the index apply its own default.
    pub time_threshold: Option<f64>,
}
