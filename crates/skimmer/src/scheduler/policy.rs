// Content policies decide which parts of the timeline are worth fetching and
// how much of the buffered-ahead content counts against the buffer target.

use super::types::TimeRange;
use crate::error::TimelineError;
use crate::timeline::{ContentTimeline, RequiredTagSet};

pub trait ContentPolicy: Send + Sync {
    /// First time at or after `time` whose content should be fetched.
    fn next_playable_time(&self, time: f64, required: &RequiredTagSet) -> f64;

    /// Duration of useful content between `from` (the playhead) and `to`
    /// (the next candidate request time).
    fn weighted_buffered_ahead(&self, from: f64, to: f64, required: &RequiredTagSet) -> f64;
}

/// Everything is played; buffered-ahead is plain wall distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unfiltered;

impl ContentPolicy for Unfiltered {
    fn next_playable_time(&self, time: f64, _required: &RequiredTagSet) -> f64 {
        time
    }

    fn weighted_buffered_ahead(&self, from: f64, to: f64, _required: &RequiredTagSet) -> f64 {
        to - from
    }
}

/// Tag-based skimming over content intervals.
impl ContentPolicy for ContentTimeline {
    fn next_playable_time(&self, time: f64, required: &RequiredTagSet) -> f64 {
        ContentTimeline::next_playable_time(self, time, required)
    }

    fn weighted_buffered_ahead(&self, from: f64, to: f64, required: &RequiredTagSet) -> f64 {
        self.interesting_duration(from, to, required)
    }
}

/// An explicit, pre-selected list of ranges to play. Anything outside the
/// ranges is skipped regardless of the required tags.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRanges {
    ranges: Vec<TimeRange>,
    total_duration: f64,
}

impl PlayRanges {
    pub fn new(ranges: Vec<TimeRange>, total_duration: f64) -> Result<Self, TimelineError> {
        let mut previous_end = f64::NEG_INFINITY;
        for (index, range) in ranges.iter().enumerate() {
            if !(range.end > range.start) || range.end > total_duration {
                return Err(TimelineError::InvalidBounds {
                    index,
                    start: range.start,
                    end: range.end,
                });
            }
            if range.start < previous_end {
                return Err(TimelineError::Overlapping {
                    index,
                    start: range.start,
                    previous_end,
                });
            }
            previous_end = range.end;
        }
        Ok(Self {
            ranges,
            total_duration,
        })
    }

    /// Collapse a tagged timeline into the ranges matching `required`.
    pub fn select(timeline: &ContentTimeline, required: &RequiredTagSet) -> Self {
        let mut ranges: Vec<TimeRange> = Vec::new();
        for interval in timeline
            .intervals()
            .iter()
            .filter(|i| required.matches(&i.tags))
        {
            match ranges.last_mut() {
                Some(last) if last.end == interval.start => last.end = interval.end,
                _ => ranges.push(TimeRange::new(interval.start, interval.end)),
            }
        }
        Self {
            ranges,
            total_duration: timeline.duration(),
        }
    }

    pub fn ranges(&self) -> &[TimeRange] {
        &self.ranges
    }

    /// Played duration in `[0, time)`.
    fn played_until(&self, time: f64) -> f64 {
        self.ranges
            .iter()
            .take_while(|r| r.start < time)
            .map(|r| r.end.min(time) - r.start)
            .sum()
    }
}

impl ContentPolicy for PlayRanges {
    fn next_playable_time(&self, time: f64, _required: &RequiredTagSet) -> f64 {
        for range in &self.ranges {
            if range.contains(time) {
                return time;
            }
            if time < range.start {
                return range.start;
            }
        }
        if time.is_nan() {
            return time;
        }
        time.max(self.total_duration)
    }

    fn weighted_buffered_ahead(&self, from: f64, to: f64, _required: &RequiredTagSet) -> f64 {
        self.played_until(to) - self.played_until(from)
    }
}
