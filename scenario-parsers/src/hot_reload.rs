use std::path::Path;

use correlator::{
    CorrelationKey, EventObserver, IntervalTracker, KernelKeyword, MarkerMatcher, Platform,
    SessionPlan,
};
use trace_model::{Counter, TraceEvent};

use crate::time_to_main::PROVIDER_NAME;
use crate::{run_pass, MetricParser, Scenario};

pub const HOT_RELOAD_EVENT_NAME: &str = "HotReload";
pub const HOT_RELOAD_EVENT_ID: u16 = 3;
pub const HOT_RELOAD_END_EVENT_NAME: &str = "HotReloadEnd";
pub const HOT_RELOAD_END_EVENT_ID: u16 = 4;

/// Edit-applied latency: the runtime emits a marker pair around each
/// hot-reload delta, one interval per edit. No kernel process events
/// are involved; both markers come from the tracked process itself.
pub struct HotReloadParser;

struct HotReloadObserver {
    pids: Vec<i32>,
    begin: MarkerMatcher,
    end: MarkerMatcher,
    intervals: IntervalTracker,
}

impl HotReloadObserver {
    fn new(platform: Platform, scenario: &Scenario) -> Self {
        HotReloadObserver {
            pids: scenario.pids.clone(),
            begin: MarkerMatcher::bind(
                platform,
                PROVIDER_NAME,
                HOT_RELOAD_EVENT_NAME,
                HOT_RELOAD_EVENT_ID,
            ),
            end: MarkerMatcher::bind(
                platform,
                PROVIDER_NAME,
                HOT_RELOAD_END_EVENT_NAME,
                HOT_RELOAD_END_EVENT_ID,
            ),
            intervals: IntervalTracker::new(),
        }
    }

    fn into_counters(self) -> Vec<Counter> {
        vec![Counter::builder()
            .name("Hot Reload Time")
            .default_counter(true)
            .top_counter(true)
            .results(self.intervals.into_results())
            .build()]
    }
}

impl EventObserver for HotReloadObserver {
    fn on_provider_event(&mut self, event: &TraceEvent) {
        if !self.pids.contains(&event.pid) {
            return;
        }
        let key = CorrelationKey::Process(event.pid);
        if self.begin.matches(event) {
            self.intervals.open(key, event.timestamp_ms);
        } else if self.end.matches(event) {
            self.intervals.close(key, event.timestamp_ms);
        }
    }
}

impl MetricParser for HotReloadParser {
    fn session_plan(&self) -> SessionPlan {
        SessionPlan::new()
            .kernel(KernelKeyword::Process)
            .provider(PROVIDER_NAME)
    }

    fn parse(
        &self,
        path: &Path,
        platform: Platform,
        scenario: &Scenario,
    ) -> correlator::Result<Vec<Counter>> {
        let mut observer = HotReloadObserver::new(platform, scenario);
        run_pass(path, platform, &mut observer)?;
        Ok(observer.into_counters())
    }
}
