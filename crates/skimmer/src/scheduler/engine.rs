// Scheduling Engine: decides which fragment a track should request next.
//
// `execute` is a synchronous mapping from (context, seek targets, playhead,
// required tags, external queue/buffer/index state) to a decision. Its only
// side effects are on the context, the seek targets and the rejected-request
// queue.

use super::context::SchedulingContext;
use super::policy::ContentPolicy;
use super::seek::SeekTargets;
use super::types::{
    FragmentRequest, Priority, RequestOptions, RequestState, SchedulingDecision, StallReason,
};
use crate::config::SchedulerConfig;
use crate::timeline::RequiredTagSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// Where the candidate time of one `execute` call came from.
enum Candidate {
    Seek(f64),
    Rejected(FragmentRequest),
    Committed(Option<f64>),
}

pub struct SchedulingEngine {
    policy: Arc<dyn ContentPolicy>,
    config: SchedulerConfig,
}

impl SchedulingEngine {
    pub fn new(policy: Arc<dyn ContentPolicy>, config: SchedulerConfig) -> Self {
        Self { policy, config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn policy(&self) -> &Arc<dyn ContentPolicy> {
        &self.policy
    }

    /// Replace the content policy, e.g. once content metadata has loaded.
    pub fn set_policy(&mut self, policy: Arc<dyn ContentPolicy>) {
        self.policy = policy;
    }

    pub fn execute(
        &self,
        ctx: &mut SchedulingContext,
        seeks: &mut SeekTargets,
        playback_time: f64,
        required: &RequiredTagSet,
    ) -> SchedulingDecision {
        let media_type = ctx.media_type();
        let seek_target = seeks.peek(media_type);
        let priority = if seek_target.is_some() {
            Priority::Strong
        } else {
            Priority::Default
        };

        let rejected = ctx
            .requests()
            .requests_by_state(RequestState::Rejected)
            .into_iter()
            .next();
        let keep_index = rejected.is_some() && seek_target.is_none();
        let committed = ctx.index_handler_time();

        let candidate = match (seek_target, &rejected) {
            (Some(target), _) => Candidate::Seek(target),
            (None, Some(r))
                if r.end_time() > playback_time
                    && committed.is_none_or(|c| r.start_time <= c) =>
            {
                Candidate::Rejected(r.clone())
            }
            _ => Candidate::Committed(committed),
        };

        let time = match &candidate {
            Candidate::Seek(target) => {
                debug!(track = %ctx.key(), seek_time = target, "Scheduling from seek target");
                Some(*target)
            }
            Candidate::Rejected(r) => {
                debug!(
                    track = %ctx.key(),
                    start_time = r.start_time,
                    index = r.index,
                    "Retrying rejected request"
                );
                Some(r.start_time)
            }
            Candidate::Committed(t) => *t,
        };

        // Admission control only applies to normal advance.
        if seek_target.is_none()
            && rejected.is_none()
            && let Some(t) = time
        {
            let buffered = self
                .policy
                .weighted_buffered_ahead(playback_time, t, required);
            if buffered > self.config.buffer_target.as_secs_f64() {
                trace!(
                    track = %ctx.key(),
                    buffered_ahead = buffered,
                    target = self.config.buffer_target.as_secs_f64(),
                    "Buffer target reached, holding back"
                );
                return SchedulingDecision::stall(StallReason::Backpressure, priority);
            }
        }

        if let Some(r) = &rejected {
            ctx.requests().remove_rejected(r);
        }

        let Some(mut time) = time.filter(|t| t.is_finite()) else {
            trace!(track = %ctx.key(), "No valid candidate time");
            return SchedulingDecision::stall(StallReason::InvalidTime, priority);
        };
        if ctx.is_disabled() {
            trace!(track = %ctx.key(), "All text variants disabled");
            return SchedulingDecision::stall(StallReason::TrackDisabled, priority);
        }

        if seek_target.is_some() {
            seeks.take(media_type);
        }

        if let Some(buffer) = ctx.buffer()
            && let Some(range) = buffer.buffer_range_containing(time)
            && let Some(last) = buffer.staged_fragments_in_range(range).last()
        {
            trace!(
                track = %ctx.key(),
                from = time,
                to = last.buffered_range.end,
                "Skipping already buffered range"
            );
            time = last.buffered_range.end;
        }

        let retrying = match &candidate {
            Candidate::Rejected(r) => Some(r),
            _ => None,
        };

        // A retry must land exactly on the rejected segment.
        if retrying.is_none() {
            let playable = self.policy.next_playable_time(time, required);
            if playable != time {
                debug!(
                    track = %ctx.key(),
                    from = time,
                    to = playable,
                    "Skipping uninteresting content"
                );
                time = playable;
            }
        }

        let options = RequestOptions {
            keep_index,
            time_threshold: None,
        };
        let mut request = ctx.index().fragment_request_for_time(time, options);

        if let Some(r) = retrying
            && request.as_ref().is_some_and(|req| req.index != r.index)
        {
            let midpoint = r.start_time + r.duration / 2.0 + self.config.rejected_midpoint_epsilon;
            request = ctx.index().fragment_request_for_time(
                midpoint,
                RequestOptions {
                    keep_index,
                    time_threshold: Some(0.0),
                },
            );
        }

        loop {
            match &request {
                Some(req) if req.is_complete() => {
                    debug!(track = %ctx.key(), "Representation index exhausted");
                    ctx.set_index_handler_time(None);
                    return SchedulingDecision::stall(StallReason::IndexExhausted, priority);
                }
                Some(req) if ctx.requests().is_loaded_or_pending(req) => {
                    request = ctx.index().next_fragment_request();
                }
                _ => break,
            }
        }

        let Some(request) = request else {
            return SchedulingDecision::stall(StallReason::NoRequest, priority);
        };

        if retrying.is_none() {
            let next = self.policy.next_playable_time(request.start_time, required);
            let committed = if next != request.start_time {
                next
            } else {
                request.end_time()
            };
            ctx.set_index_handler_time(Some(committed));
        }

        trace!(
            track = %ctx.key(),
            index = request.index,
            start_time = request.start_time,
            duration = request.duration,
            priority = ?priority,
            "Fragment scheduled"
        );
        SchedulingDecision::request(request, priority)
    }
}
