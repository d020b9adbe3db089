use reqwest::StatusCode;
use reqwest::header::HeaderMap;

/// Event code reported when the manifest body could not be parsed.
pub const PARSER_ERROR_CODE: u32 = 1;
/// Event code reported when every download attempt failed.
pub const DOWNLOAD_ERROR_CODE: u32 = 2;
/// Event code reported when remote manifest elements could not be resolved.
pub const LINK_RESOLUTION_ERROR_CODE: u32 = 3;
/// Event code reported when the manifest URL itself is unusable.
pub const INVALID_URL_ERROR_CODE: u32 = 4;

/// Failure of a single HTTP exchange, as seen by the transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Non-2xx response. `url` is the final URL after redirects.
    #[error("HTTP {status} for {url}")]
    Status {
        status: StatusCode,
        url: String,
        headers: Option<Box<HeaderMap>>,
    },

    #[error("transfer from {url} terminated early after {received} bytes: {reason}")]
    Body {
        url: String,
        received: u64,
        reason: String,
    },

    #[error("request to {url} could not be built: {reason}")]
    Request { url: String, reason: String },
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } | Self::Body { .. } => true,
            Self::Status { .. } => true,
            Self::Request { .. } => false,
        }
    }

    /// Status code of the response, if one was received before the failure.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// URL of the resource that actually answered, if a response was received.
    pub fn response_url(&self) -> Option<&str> {
        match self {
            Self::Status { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn response_headers(&self) -> Option<&HeaderMap> {
        match self {
            Self::Status { headers, .. } => headers.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_connect() {
            Self::Connect {
                url,
                reason: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Status {
                status,
                url,
                headers: None,
            }
        } else if err.is_body() || err.is_decode() {
            Self::Body {
                url,
                received: 0,
                reason: err.to_string(),
            }
        } else if err.is_builder() {
            Self::Request {
                url,
                reason: err.to_string(),
            }
        } else {
            Self::Connect {
                url,
                reason: err.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ManifestError {
    #[error("invalid manifest URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("manifest download failed: {source}")]
    Network {
        #[from]
        source: TransportError,
    },

    #[error("failed loading manifest {url}, parsing failed: {reason}")]
    Parse { url: String, reason: String },

    #[error("failed loading manifest {url}, no retry attempts left after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_status: Option<StatusCode>,
    },

    #[error("failed resolving remote elements of manifest {url}: {reason}")]
    LinkResolution { url: String, reason: String },
}

impl ManifestError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { source } => source.is_retryable(),
            Self::InvalidUrl { .. }
            | Self::Parse { .. }
            | Self::RetriesExhausted { .. }
            | Self::LinkResolution { .. } => false,
        }
    }

    /// Code carried by the `LoadFailed` event for this error.
    pub fn code(&self) -> u32 {
        match self {
            Self::Parse { .. } => PARSER_ERROR_CODE,
            Self::Network { .. } | Self::RetriesExhausted { .. } => DOWNLOAD_ERROR_CODE,
            Self::LinkResolution { .. } => LINK_RESOLUTION_ERROR_CODE,
            Self::InvalidUrl { .. } => INVALID_URL_ERROR_CODE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimelineError {
    #[error("interval {index} has invalid bounds [{start}, {end})")]
    InvalidBounds { index: usize, start: f64, end: f64 },

    #[error("interval {index} starts at {start} before the previous interval ends at {previous_end}")]
    Overlapping {
        index: usize,
        start: f64,
        previous_end: f64,
    },

    #[error("content metadata could not be decoded: {reason}")]
    Metadata { reason: String },
}

impl From<serde_json::Error> for TimelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Metadata {
            reason: err.to_string(),
        }
    }
}
