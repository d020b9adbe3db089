use chrono::{DateTime, Utc};

use crate::metrics::TraceSample;

/// Collects per-chunk progress samples of one transfer.
#[derive(Debug)]
pub struct ProgressTracker {
    total: Option<u64>,
    loaded: u64,
    last_trace_time: DateTime<Utc>,
    first_byte_time: Option<DateTime<Utc>>,
    traces: Vec<TraceSample>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub first_byte_time: Option<DateTime<Utc>>,
    pub loaded: u64,
    pub traces: Vec<TraceSample>,
}

impl ProgressTracker {
    /// `total` is the announced body size, when the server sent one.
    pub fn new(request_time: DateTime<Utc>, total: Option<u64>) -> Self {
        Self {
            total,
            loaded: 0,
            last_trace_time: request_time,
            first_byte_time: None,
            traces: Vec::new(),
        }
    }

    pub fn on_progress(&mut self, now: DateTime<Utc>, received: u64) {
        self.loaded += received;

        // A first event that already carries the whole body says nothing
        // about latency.
        if self.traces.is_empty() && self.total.is_none_or(|total| total != self.loaded) {
            self.first_byte_time = Some(now);
        }

        self.traces.push(TraceSample {
            start: self.last_trace_time,
            duration_ms: (now - self.last_trace_time).num_milliseconds(),
            bytes: received,
        });
        self.last_trace_time = now;
    }

    pub fn loaded(&self) -> u64 {
        self.loaded
    }

    pub fn finish(self) -> ProgressReport {
        ProgressReport {
            first_byte_time: self.first_byte_time,
            loaded: self.loaded,
            traces: self.traces,
        }
    }
}
