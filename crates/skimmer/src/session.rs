// Scheduling Session: owns the per-track contexts, the seek targets and the
// required tags of one player session, and drives the scheduling engine from
// a tokio event loop.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::SessionConfig;
use crate::metrics::{RequestQueueState, SchedulingInfo, TelemetrySink};
use crate::scheduler::{
    ContentPolicy, MediaType, PlaybackController, RequestQueue, RequestState, SchedulingContext,
    SchedulingDecision, SchedulingEngine, SeekTargets, TrackKey,
};
use crate::timeline::RequiredTagSet;

/// Inputs processed by [`SessionDriver`]. Each event is handled as one wave:
/// its handler runs first, then any work it deferred.
pub enum SessionEvent {
    /// The player started seeking to the given time.
    Seeking(f64),
    RequiredTags(RequiredTagSet),
    Policy(Arc<dyn ContentPolicy>),
    Attach(SchedulingContext),
    Detach(TrackKey),
    VariantsDisabled { key: TrackKey, disabled: bool },
    Reset,
}

pub struct SchedulingSession {
    engine: SchedulingEngine,
    contexts: BTreeMap<TrackKey, SchedulingContext>,
    seeks: SeekTargets,
    required: RequiredTagSet,
    playback: Arc<dyn PlaybackController>,
    telemetry: Arc<dyn TelemetrySink>,
    config: SessionConfig,
}

impl SchedulingSession {
    pub fn new(
        policy: Arc<dyn ContentPolicy>,
        playback: Arc<dyn PlaybackController>,
        telemetry: Arc<dyn TelemetrySink>,
        config: SessionConfig,
    ) -> Self {
        Self {
            engine: SchedulingEngine::new(policy, config.scheduler.clone()),
            contexts: BTreeMap::new(),
            seeks: SeekTargets::new(),
            required: RequiredTagSet::new(),
            playback,
            telemetry,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn set_policy(&mut self, policy: Arc<dyn ContentPolicy>) {
        self.engine.set_policy(policy);
    }

    /// Attach a track. An existing context for the same key is replaced and
    /// returned.
    pub fn attach_track(&mut self, ctx: SchedulingContext) -> Option<SchedulingContext> {
        debug!(track = %ctx.key(), start_time = ?ctx.index_handler_time(), "Track attached");
        self.contexts.insert(ctx.key().clone(), ctx)
    }

    /// Detach a track. A seek target left for its media type is dropped once
    /// no attached track of that type remains to consume it.
    pub fn detach_track(&mut self, key: &TrackKey) -> Option<SchedulingContext> {
        let ctx = self.contexts.remove(key)?;
        debug!(track = %key, "Track detached");
        if !self.contexts.keys().any(|k| k.media_type == key.media_type) {
            self.seeks.take(key.media_type);
        }
        Some(ctx)
    }

    pub fn context(&self, key: &TrackKey) -> Option<&SchedulingContext> {
        self.contexts.get(key)
    }

    pub fn context_mut(&mut self, key: &TrackKey) -> Option<&mut SchedulingContext> {
        self.contexts.get_mut(key)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &TrackKey> {
        self.contexts.keys()
    }

    pub fn set_required_tags(&mut self, required: RequiredTagSet) {
        info!(tags = ?required, "Required tags updated");
        self.required = required;
    }

    pub fn required_tags(&self) -> &RequiredTagSet {
        &self.required
    }

    pub fn seek_targets(&self) -> &SeekTargets {
        &self.seeks
    }

    /// First half of seek handling: drop queued requests synchronously and
    /// queue the target. It becomes visible to `execute` only after
    /// [`run_deferred`](Self::run_deferred).
    pub fn on_seeking(&mut self, time: f64) {
        debug!(seek_time = time, tracks = self.contexts.len(), "Seeking");
        for ctx in self.contexts.values() {
            ctx.requests().cancel_pending();
        }
        self.seeks.defer(time);
    }

    /// Run the work deferred by the current event wave. The seek target is
    /// published only to media types that currently have a track.
    pub fn run_deferred(&mut self) -> Option<f64> {
        let attached: BTreeSet<MediaType> = self.contexts.keys().map(|k| k.media_type).collect();
        self.seeks.commit_deferred(attached)
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Seeking(time) => self.on_seeking(time),
            SessionEvent::RequiredTags(required) => self.set_required_tags(required),
            SessionEvent::Policy(policy) => self.set_policy(policy),
            SessionEvent::Attach(ctx) => {
                self.attach_track(ctx);
            }
            SessionEvent::Detach(key) => {
                self.detach_track(&key);
            }
            SessionEvent::VariantsDisabled { key, disabled } => {
                if let Some(ctx) = self.contexts.get_mut(&key) {
                    ctx.set_all_variants_disabled(disabled);
                }
            }
            SessionEvent::Reset => self.reset(),
        }
    }

    /// Decide the next request for one track. Returns `None` for unknown tracks.
    pub fn execute(&mut self, key: &TrackKey) -> Option<SchedulingDecision> {
        let playback_time = self.playback.current_time();
        let ctx = self.contexts.get_mut(key)?;
        let decision = self
            .engine
            .execute(ctx, &mut self.seeks, playback_time, &self.required);
        record(self.telemetry.as_ref(), ctx, &decision);
        Some(decision)
    }

    /// Decide for every attached track, in key order.
    pub fn execute_all(&mut self) -> Vec<(TrackKey, SchedulingDecision)> {
        let playback_time = self.playback.current_time();
        let mut decisions = Vec::with_capacity(self.contexts.len());
        for (key, ctx) in self.contexts.iter_mut() {
            let decision = self
                .engine
                .execute(ctx, &mut self.seeks, playback_time, &self.required);
            record(self.telemetry.as_ref(), ctx, &decision);
            decisions.push((key.clone(), decision));
        }
        decisions
    }

    /// Move the playhead out of uninteresting content. The player reports the
    /// resulting seek back through the usual seeking notification.
    pub fn skip_uninteresting_playback(&self) -> Option<f64> {
        if !self.config.skip_uninteresting_playback {
            return None;
        }
        let time = self.playback.current_time();
        if !time.is_finite() {
            return None;
        }
        let target = self.engine.policy().next_playable_time(time, &self.required);
        if target > time {
            debug!(from = time, to = target, "Skipping uninteresting playback");
            self.playback.seek(target);
            Some(target)
        } else {
            None
        }
    }

    /// Forget all tracks and seek targets.
    pub fn reset(&mut self) {
        debug!(tracks = self.contexts.len(), "Session reset");
        self.contexts.clear();
        self.seeks.clear();
    }
}

fn record(telemetry: &dyn TelemetrySink, ctx: &SchedulingContext, decision: &SchedulingDecision) {
    if let Some(request) = &decision.request {
        telemetry.record_scheduling_info(SchedulingInfo::for_request(
            request,
            RequestState::Pending,
        ));
    }
    telemetry.record_request_queue_state(ctx.media_type(), queue_snapshot(ctx.requests()));
}

fn queue_snapshot(queue: &dyn RequestQueue) -> RequestQueueState {
    RequestQueueState {
        pending: queue.requests_by_state(RequestState::Pending),
        loading: queue.requests_by_state(RequestState::Loading),
        executed: queue.requests_by_state(RequestState::Executed),
        rejected: queue.requests_by_state(RequestState::Rejected),
    }
}

/// Runs a [`SchedulingSession`] on a tokio task.
pub struct SessionDriver {
    session: SchedulingSession,
}

impl SessionDriver {
    pub fn new(session: SchedulingSession) -> Self {
        Self { session }
    }

    /// Spawn [`run`](Self::run) with channels sized by `event_buffer`.
    pub fn spawn(
        self,
        token: CancellationToken,
    ) -> (
        JoinHandle<SchedulingSession>,
        mpsc::Sender<SessionEvent>,
        mpsc::Receiver<(TrackKey, SchedulingDecision)>,
    ) {
        let capacity = self.session.config.event_buffer.max(1);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (decision_tx, decision_rx) = mpsc::channel(capacity);
        let handle = tokio::spawn(self.run(event_rx, decision_tx, token));
        (handle, event_tx, decision_rx)
    }

    /// Process events and re-evaluate every track on each tick until the
    /// token is cancelled or the event channel closes. Only decisions that
    /// carry a request are forwarded. Returns the session for inspection.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<SessionEvent>,
        decisions: mpsc::Sender<(TrackKey, SchedulingDecision)>,
        token: CancellationToken,
    ) -> SchedulingSession {
        let mut ticker = tokio::time::interval(self.session.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        'driver: loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    debug!("Cancellation token received, stopping session driver");
                    break;
                }

                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("Session event channel closed");
                        break;
                    };
                    self.session.handle_event(event);
                    self.session.run_deferred();
                }

                _ = ticker.tick() => {
                    self.session.skip_uninteresting_playback();
                    for (key, decision) in self.session.execute_all() {
                        if decision.is_stall() {
                            trace!(track = %key, stall = ?decision.stall, "No request this tick");
                            continue;
                        }
                        if decisions.send((key, decision)).await.is_err() {
                            debug!("Decision receiver dropped, stopping session driver");
                            break 'driver;
                        }
                    }
                }
            }
        }

        self.session
    }
}
