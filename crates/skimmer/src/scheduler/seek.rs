// Seek targets: at most one pending seek position per media type.
//
// A seek notification is captured in two steps. `defer` queues the target while
// the rest of the seek event wave (request cancellation in particular) is still
// running; `commit_deferred` publishes it once that wave has completed. The
// scheduler only ever observes committed targets.

use super::types::MediaType;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

#[derive(Debug, Default)]
pub struct SeekTargets {
    targets: HashMap<MediaType, f64>,
    deferred: VecDeque<f64>,
}

impl SeekTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a seek target without making it visible yet.
    pub fn defer(&mut self, time: f64) {
        self.deferred.push_back(time);
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Publish queued targets for the given media types. When several seeks
    /// were queued in one wave the latest one wins. Returns the published
    /// target.
    pub fn commit_deferred(
        &mut self,
        media_types: impl IntoIterator<Item = MediaType>,
    ) -> Option<f64> {
        let latest = self.deferred.drain(..).last()?;
        let mut committed = 0usize;
        for media_type in media_types {
            self.targets.insert(media_type, latest);
            committed += 1;
        }
        debug!(seek_time = latest, media_types = committed, "Seek target committed");
        Some(latest)
    }

    /// Set a target for a single media type, replacing any outstanding one.
    pub fn set(&mut self, media_type: MediaType, time: f64) {
        self.targets.insert(media_type, time);
    }

    pub fn peek(&self, media_type: MediaType) -> Option<f64> {
        self.targets.get(&media_type).copied()
    }

    /// Consume the target for `media_type`.
    pub fn take(&mut self, media_type: MediaType) -> Option<f64> {
        self.targets.remove(&media_type)
    }

    pub fn clear(&mut self) {
        self.targets.clear();
        self.deferred.clear();
    }
}
