// Fragment scheduling: per-track decision of which media segment to request next.

mod context;
mod engine;
pub mod policy;
mod seek;
pub mod track;
pub mod types;

pub use context::{SchedulingContext, TrackKey};
pub use engine::SchedulingEngine;
pub use policy::{ContentPolicy, PlayRanges, Unfiltered};
pub use seek::SeekTargets;
pub use track::{BufferAccessor, PlaybackController, RepresentationIndex, RequestQueue};
pub use types::{
    FragmentRequest, MediaType, Priority, RequestAction, RequestOptions, RequestState,
    SchedulingDecision, StagedFragment, StallReason, TimeRange,
};
