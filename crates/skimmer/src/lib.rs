// Decision core of an adaptive HTTP streaming client: per-track fragment
// scheduling with content-interest skimming, plus manifest acquisition.
pub mod config;
pub mod error;
pub mod manifest;
pub mod metrics;
pub mod scheduler;
pub mod session;
pub mod timeline;

#[cfg(test)]
pub(crate) mod test_utils;

// Export common types for ease of use
pub use config::{ManifestLoaderConfig, SchedulerConfig, SessionConfig};
pub use error::{ManifestError, TimelineError, TransportError};
pub use manifest::{
    HttpTransport, LinkResolver, Manifest, ManifestEvent, ManifestKind, ManifestLoader,
    ManifestParser, ParsedManifest, ReqwestTransport, RequestModifier,
};
pub use metrics::{MetricsStore, TelemetrySink};
pub use scheduler::{
    ContentPolicy, FragmentRequest, MediaType, PlayRanges, Priority, SchedulingContext,
    SchedulingDecision, SchedulingEngine, StallReason, TrackKey, Unfiltered,
};
pub use session::{SchedulingSession, SessionDriver, SessionEvent};
pub use timeline::{ContentInterval, ContentTimeline, RequiredTagSet};
