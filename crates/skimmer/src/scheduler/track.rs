// Narrow interfaces to the per-track collaborators the scheduler consults.
// Implementations live with the host player (segment index, fragment loader,
// media buffer); the scheduler only reads them and removes rejected requests.

use super::types::{FragmentRequest, RequestOptions, RequestState, StagedFragment, TimeRange};

/// Maps presentation time to concrete segments of the active representation.
pub trait RepresentationIndex: Send + Sync {
    /// Resolve the segment covering `time`.
    fn fragment_request_for_time(
        &self,
        time: f64,
        options: RequestOptions,
    ) -> Option<FragmentRequest>;

    /// The segment following the one most recently resolved. Returns a
    /// request with `RequestAction::Complete` once the index is exhausted.
    fn next_fragment_request(&self) -> Option<FragmentRequest>;
}

/// The fragment loader's view of requests, keyed by lifecycle state.
pub trait RequestQueue: Send + Sync {
    fn requests_by_state(&self, state: RequestState) -> Vec<FragmentRequest>;

    fn remove_rejected(&self, request: &FragmentRequest);

    fn is_loaded_or_pending(&self, request: &FragmentRequest) -> bool;

    /// Drop pending and rejected requests. Called synchronously on seek,
    /// before the new seek target becomes visible to the scheduler.
    fn cancel_pending(&self);
}

/// Read access to the committed media buffer and its staging storage.
pub trait BufferAccessor: Send + Sync {
    fn buffer_range_containing(&self, time: f64) -> Option<TimeRange>;

    /// Fragments appended inside `range`, ordered by presentation time.
    fn staged_fragments_in_range(&self, range: TimeRange) -> Vec<StagedFragment>;
}

/// Playback position source and seek sink.
pub trait PlaybackController: Send + Sync {
    fn current_time(&self) -> f64;

    fn seek(&self, time: f64);
}
