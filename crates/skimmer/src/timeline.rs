// Content Timeline: tagged intervals describing which parts of a presentation
// are of interest to the viewer.

use crate::error::TimelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The set of tags the viewer declared interest in.
///
/// An empty set means "everything is interesting": no interval is ever skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequiredTagSet(BTreeSet<String>);

impl RequiredTagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.0.insert(tag.into())
    }

    pub fn remove(&mut self, tag: &str) -> bool {
        self.0.remove(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Whether content carrying `tags` should be played.
    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        self.0.is_empty() || !self.0.is_disjoint(tags)
    }
}

impl<S: Into<String>> FromIterator<S> for RequiredTagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A half-open range `[start, end)` of presentation time carrying a tag set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentInterval {
    pub start: f64,
    pub end: f64,
    #[serde(default, alias = "keywords")]
    pub tags: BTreeSet<String>,
}

impl ContentInterval {
    pub fn new<I, S>(start: f64, end: f64, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            start,
            end,
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Length of the intersection between this interval and `[from, to)`.
    fn overlap(&self, from: f64, to: f64) -> f64 {
        (self.end.min(to) - self.start.max(from)).max(0.0)
    }
}

#[derive(Deserialize)]
struct ContentMetadata {
    #[serde(alias = "intervals")]
    events: Vec<ContentInterval>,
}

/// Ordered, non-overlapping content intervals of one presentation.
///
/// Time not covered by any interval is treated as interesting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentTimeline {
    intervals: Vec<ContentInterval>,
}

impl ContentTimeline {
    pub fn new(intervals: Vec<ContentInterval>) -> Result<Self, TimelineError> {
        let mut previous_end = f64::NEG_INFINITY;
        for (index, interval) in intervals.iter().enumerate() {
            if !interval.start.is_finite()
                || !interval.end.is_finite()
                || interval.end <= interval.start
            {
                return Err(TimelineError::InvalidBounds {
                    index,
                    start: interval.start,
                    end: interval.end,
                });
            }
            if interval.start < previous_end {
                return Err(TimelineError::Overlapping {
                    index,
                    start: interval.start,
                    previous_end,
                });
            }
            previous_end = interval.end;
        }
        Ok(Self { intervals })
    }

    /// Builds a timeline from content metadata of the form
    /// `{"events": [{"start": 0, "end": 18, "keywords": ["racing"]}, ...]}`.
    pub fn from_json(metadata: &str) -> Result<Self, TimelineError> {
        let metadata: ContentMetadata = serde_json::from_str(metadata)?;
        Self::new(metadata.events)
    }

    pub fn intervals(&self) -> &[ContentInterval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// End of the last interval, or zero for an empty timeline.
    pub fn duration(&self) -> f64 {
        self.intervals.last().map_or(0.0, |i| i.end)
    }

    pub fn interval_at(&self, time: f64) -> Option<&ContentInterval> {
        self.index_at(time).map(|idx| &self.intervals[idx])
    }

    fn index_at(&self, time: f64) -> Option<usize> {
        if time.is_nan() {
            return None;
        }
        let idx = self.intervals.partition_point(|i| i.end <= time);
        self.intervals
            .get(idx)
            .filter(|i| i.contains(time))
            .map(|_| idx)
    }

    pub fn is_interesting(&self, time: f64, required: &RequiredTagSet) -> bool {
        self.interval_at(time)
            .is_none_or(|interval| required.matches(&interval.tags))
    }

    /// First time at or after `time` that is worth playing.
    ///
    /// Walks forward over consecutive uninteresting intervals. When the
    /// timeline ends inside uninteresting content, the end of the last
    /// skipped interval is returned.
    pub fn next_playable_time(&self, time: f64, required: &RequiredTagSet) -> f64 {
        if required.is_empty() {
            return time;
        }
        let mut time = time;
        while let Some(idx) = self.index_at(time) {
            let interval = &self.intervals[idx];
            if required.matches(&interval.tags) {
                break;
            }
            time = interval.end;
        }
        time
    }

    /// Amount of interesting content inside `[from, to)`.
    pub fn interesting_duration(&self, from: f64, to: f64, required: &RequiredTagSet) -> f64 {
        if !(to > from) {
            return 0.0;
        }
        let span = to - from;
        if required.is_empty() {
            return span;
        }
        let first = self.intervals.partition_point(|i| i.end <= from);
        let skipped: f64 = self.intervals[first..]
            .iter()
            .take_while(|i| i.start < to)
            .filter(|i| !required.matches(&i.tags))
            .map(|i| i.overlap(from, to))
            .sum();
        (span - skipped).max(0.0)
    }
}
