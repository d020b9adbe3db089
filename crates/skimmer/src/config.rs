use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

pub const DEFAULT_USER_AGENT: &str = concat!("skimmer-engine/", env!("CARGO_PKG_VERSION"));

/// Largest manifest body accepted by the HTTP transport.
pub const DEFAULT_MAX_BODY_SIZE: u64 = 64 * 1024 * 1024;

/// Buffer horizon kept ahead of the playhead when playing at top quality.
pub const BUFFER_TIME_AT_TOP_QUALITY: Duration = Duration::from_secs(30);

// --- Scheduler Configuration ---
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum amount of "useful" content buffered ahead of the playhead before
    /// the scheduler stops issuing new requests.
    pub buffer_target: Duration,
    /// Offset added to the midpoint of a rejected request when re-resolving it,
    /// so that boundary rounding cannot land on the neighbouring segment.
    pub rejected_midpoint_epsilon: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            buffer_target: BUFFER_TIME_AT_TOP_QUALITY,
            rejected_midpoint_epsilon: 0.1,
        }
    }
}

// --- Manifest Loader Configuration ---
#[derive(Debug, Clone)]
pub struct ManifestLoaderConfig {
    /// Total number of attempts, including the first one.
    pub retry_attempts: u32,
    /// Fixed delay between two attempts. There is no backoff growth.
    pub retry_interval: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Extra headers sent with every manifest request
    pub headers: HeaderMap,
    /// Responses declaring or delivering more than this many bytes fail with
    /// `TransportError::Body`.
    pub max_body_size: u64,
}

impl Default for ManifestLoaderConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: ManifestLoaderConfig::get_default_headers(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl ManifestLoaderConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/dash+xml,video/vnd.mpeg.dash.mpd,*/*;q=0.8"),
        );
        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );
        default_headers
    }
}

// --- Session Configuration ---
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub scheduler: SchedulerConfig,
    /// Cadence at which the driver re-evaluates every attached track
    pub tick_interval: Duration,
    /// Seek the playhead past uninteresting content when it lands inside it
    pub skip_uninteresting_playback: bool,
    /// Capacity of the decision channel created by the driver helpers
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            tick_interval: Duration::from_millis(100),
            skip_uninteresting_playback: true,
            event_buffer: 32,
        }
    }
}
