use std::path::Path;

use correlator::{
    CorrelationKey, EventObserver, IntervalTracker, KernelKeyword, MarkerMatcher, Platform,
    ProcessFilter, SessionPlan, ThreadTimeTracker,
};
use trace_model::{ContextSwitch, Counter, TraceEvent};

use crate::{run_pass, MetricParser, Scenario};

pub const PROVIDER_NAME: &str = "PerfLabGenericEventSource";
pub const ON_MAIN_EVENT_NAME: &str = "OnMain";
pub const ON_MAIN_EVENT_ID: u16 = 2;

/// Process start to the runtime's `OnMain` marker: the managed entry
/// point has been reached. The marker is a named event on the Windows
/// path and a numeric event ID elsewhere.
pub struct TimeToMainParser;

struct TimeToMainObserver {
    filter: ProcessFilter,
    on_main: MarkerMatcher,
    process_name: String,
    pid: Option<i32>,
    intervals: IntervalTracker,
    thread_time: ThreadTimeTracker,
}

impl TimeToMainObserver {
    fn new(platform: Platform, scenario: &Scenario) -> Self {
        TimeToMainObserver {
            filter: ProcessFilter::new(
                platform,
                scenario.process_name.clone(),
                scenario.pids.clone(),
                scenario.command_line.clone(),
            ),
            on_main: MarkerMatcher::bind(platform, PROVIDER_NAME, ON_MAIN_EVENT_NAME, ON_MAIN_EVENT_ID),
            process_name: scenario.process_name.clone(),
            pid: None,
            intervals: IntervalTracker::new(),
            thread_time: ThreadTimeTracker::new(),
        }
    }

    fn into_counters(self) -> Vec<Counter> {
        let mut counters = vec![Counter::builder()
            .name("Time To Main")
            .default_counter(true)
            .top_counter(true)
            .results(self.intervals.into_results())
            .build()];
        if let Some(thread_time) = self.thread_time.counter("Time on Thread") {
            counters.push(thread_time);
        }
        counters
    }
}

impl EventObserver for TimeToMainObserver {
    fn on_process_start(&mut self, event: &TraceEvent) {
        if self.pid.is_none() && self.filter.matches_start(event) {
            self.pid = Some(event.pid);
            self.intervals.open(CorrelationKey::Process(event.pid), event.timestamp_ms);
        }
    }

    fn on_context_switch(&mut self, event: &TraceEvent, cs: &ContextSwitch) {
        self.thread_time
            .on_context_switch(self.pid, cs, event.timestamp_ms);
    }

    fn on_provider_event(&mut self, event: &TraceEvent) {
        let Some(pid) = self.pid else {
            return;
        };
        if event.pid != pid || !self.on_main.matches(event) {
            return;
        }
        // Named-event sources also carry the process name; require it
        // to agree when present.
        if let Some(name) = event.process_name() {
            if !name.eq_ignore_ascii_case(&self.process_name) {
                return;
            }
        }
        if self
            .intervals
            .close(CorrelationKey::Process(pid), event.timestamp_ms)
            .is_some()
        {
            self.thread_time.close_interval();
            self.pid = None;
        }
    }
}

impl MetricParser for TimeToMainParser {
    fn session_plan(&self) -> SessionPlan {
        SessionPlan::new()
            .kernel(KernelKeyword::Process)
            .kernel(KernelKeyword::Thread)
            .kernel(KernelKeyword::ContextSwitch)
            .provider(PROVIDER_NAME)
    }

    fn parse(
        &self,
        path: &Path,
        platform: Platform,
        scenario: &Scenario,
    ) -> correlator::Result<Vec<Counter>> {
        let mut observer = TimeToMainObserver::new(platform, scenario);
        run_pass(path, platform, &mut observer)?;
        Ok(observer.into_counters())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use correlator::{EventSource, VecSource};
    use rstest::*;
    use trace_model::{EventId, EventKind, Payload};

    fn start(ts: f64, pid: i32) -> TraceEvent {
        TraceEvent::new(
            ts,
            pid,
            pid,
            EventKind::ProcessStart {
                name: "app".to_string(),
                command_line: String::new(),
            },
        )
    }

    fn on_main_named(ts: f64, pid: i32) -> TraceEvent {
        let mut payload = Payload::new();
        payload.strings.insert("name".to_string(), "app".to_string());
        TraceEvent::new(
            ts,
            pid,
            pid,
            EventKind::Provider {
                provider: PROVIDER_NAME.to_string(),
                event: EventId::Named(ON_MAIN_EVENT_NAME.to_string()),
            },
        )
        .with_payload(payload)
    }

    fn on_main_numeric(ts: f64, pid: i32) -> TraceEvent {
        TraceEvent::new(
            ts,
            pid,
            pid,
            EventKind::Provider {
                provider: PROVIDER_NAME.to_string(),
                event: EventId::Numeric(ON_MAIN_EVENT_ID),
            },
        )
    }

    fn parse(platform: Platform, events: Vec<TraceEvent>) -> Vec<Counter> {
        let scenario = Scenario::new("app", vec![10, 11]);
        let mut source = VecSource::new(events, platform);
        let mut observer = TimeToMainObserver::new(platform, &scenario);
        source.process(&mut observer).unwrap();
        observer.into_counters()
    }

    #[rstest]
    fn windows_matches_named_marker() {
        let counters = parse(
            Platform::Windows,
            vec![
                start(0.0, 10),
                on_main_named(35.0, 10),
                start(100.0, 11),
                on_main_named(130.0, 11),
            ],
        );

        assert_eq!(counters[0].name, "Time To Main");
        assert_eq!(counters[0].results, vec![35.0, 30.0]);
    }

    #[rstest]
    fn linux_matches_numeric_marker() {
        let counters = parse(
            Platform::Linux,
            vec![start(0.0, 10), on_main_numeric(42.0, 10)],
        );
        assert_eq!(counters[0].results, vec![42.0]);
    }

    #[rstest]
    fn named_marker_does_not_match_on_numeric_platform() {
        let counters = parse(
            Platform::Linux,
            vec![start(0.0, 10), on_main_named(42.0, 10)],
        );
        assert!(counters[0].results.is_empty());
    }

    #[rstest]
    fn marker_from_foreign_pid_is_ignored() {
        let counters = parse(
            Platform::Windows,
            vec![start(0.0, 10), on_main_named(5.0, 99), on_main_named(20.0, 10)],
        );
        assert_eq!(counters[0].results, vec![20.0]);
    }

    #[rstest]
    fn marker_with_wrong_process_name_is_ignored() {
        let mut wrong = on_main_named(5.0, 10);
        wrong
            .payload
            .strings
            .insert("name".to_string(), "other".to_string());

        let counters = parse(Platform::Windows, vec![start(0.0, 10), wrong]);
        assert!(counters[0].results.is_empty());
    }
}
