use parking_lot::Mutex;
use skimmer_engine::scheduler::{
    PlaybackController, RepresentationIndex, RequestOptions, RequestQueue, RequestState,
};
use skimmer_engine::{
    ContentPolicy, ContentTimeline, FragmentRequest, MediaType, MetricsStore, PlayRanges,
    Priority, RequiredTagSet, SchedulingContext, SchedulingSession, SessionConfig, StallReason,
    TrackKey,
};
use std::sync::Arc;

const METADATA: &str = r#"{
    "events": [
        {"start": 0,  "end": 18, "keywords": ["racing"]},
        {"start": 18, "end": 44, "keywords": ["interview"]},
        {"start": 44, "end": 60, "keywords": ["racing", "crash"]}
    ]
}"#;

struct Segments {
    duration: f64,
    count: u64,
    cursor: Mutex<u64>,
}

impl Segments {
    fn request(&self, index: u64) -> FragmentRequest {
        if index >= self.count {
            FragmentRequest::complete(MediaType::Video, index)
        } else {
            FragmentRequest::new(
                MediaType::Video,
                index,
                index as f64 * self.duration,
                self.duration,
            )
        }
    }
}

impl RepresentationIndex for Segments {
    fn fragment_request_for_time(
        &self,
        time: f64,
        options: RequestOptions,
    ) -> Option<FragmentRequest> {
        let index = (time / self.duration).floor() as u64;
        if !options.keep_index {
            *self.cursor.lock() = index;
        }
        Some(self.request(index))
    }

    fn next_fragment_request(&self) -> Option<FragmentRequest> {
        let mut cursor = self.cursor.lock();
        *cursor += 1;
        Some(self.request(*cursor))
    }
}

#[derive(Default)]
struct Loaded {
    requests: Mutex<Vec<FragmentRequest>>,
}

impl RequestQueue for Loaded {
    fn requests_by_state(&self, state: RequestState) -> Vec<FragmentRequest> {
        match state {
            RequestState::Executed => self.requests.lock().clone(),
            _ => Vec::new(),
        }
    }

    fn remove_rejected(&self, _request: &FragmentRequest) {}

    fn is_loaded_or_pending(&self, request: &FragmentRequest) -> bool {
        self.requests.lock().iter().any(|r| r.index == request.index)
    }

    fn cancel_pending(&self) {}
}

struct Playhead(Mutex<f64>);

impl PlaybackController for Playhead {
    fn current_time(&self) -> f64 {
        *self.0.lock()
    }

    fn seek(&self, time: f64) {
        *self.0.lock() = time;
    }
}

fn racing() -> RequiredTagSet {
    ["racing"].into_iter().collect()
}

/// Runs the session until the index is exhausted, "loading" every request
/// immediately and keeping the playhead at the start.
fn fetched_start_times(policy: Arc<dyn ContentPolicy>, required: RequiredTagSet) -> Vec<f64> {
    let queue = Arc::new(Loaded::default());
    let mut session = SchedulingSession::new(
        policy,
        Arc::new(Playhead(Mutex::new(0.0))),
        Arc::new(MetricsStore::new()),
        SessionConfig::default(),
    );
    session.set_required_tags(required);
    let key = TrackKey::new("race", MediaType::Video);
    session.attach_track(
        SchedulingContext::new(
            key.clone(),
            Arc::new(Segments {
                duration: 2.0,
                count: 30,
                cursor: Mutex::new(0),
            }),
            queue.clone(),
        )
        .with_start_time(0.0),
    );

    let mut fetched = Vec::new();
    for _ in 0..100 {
        let Some(decision) = session.execute(&key) else {
            break;
        };
        match decision.request {
            Some(request) => {
                assert_eq!(decision.priority, Priority::Default);
                fetched.push(request.start_time);
                queue.requests.lock().push(request);
            }
            None if decision.stall == Some(StallReason::IndexExhausted) => break,
            None => {
                assert_eq!(decision.stall, Some(StallReason::Backpressure));
                break;
            }
        }
    }
    fetched
}

#[test]
fn timeline_policy_only_fetches_matching_content() {
    let timeline = ContentTimeline::from_json(METADATA).unwrap();
    let fetched = fetched_start_times(Arc::new(timeline), racing());

    assert!(!fetched.is_empty());
    assert!(fetched.iter().all(|t| *t < 18.0 || *t >= 44.0));
    assert!(fetched.contains(&0.0));
    assert!(fetched.contains(&44.0));
}

#[test]
fn play_ranges_behave_like_the_selected_timeline() {
    let timeline = ContentTimeline::from_json(METADATA).unwrap();
    let ranges = PlayRanges::select(&timeline, &racing());

    let via_ranges = fetched_start_times(Arc::new(ranges), RequiredTagSet::new());
    let via_timeline = fetched_start_times(Arc::new(timeline), racing());
    assert_eq!(via_ranges, via_timeline);
}
