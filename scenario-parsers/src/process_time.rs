use std::path::Path;

use correlator::{
    CorrelationKey, EventObserver, IntervalTracker, KernelKeyword, Platform, ProcessFilter,
    SessionPlan, ThreadTimeTracker,
};
use trace_model::{ContextSwitch, Counter, TraceEvent};

use crate::{run_pass, MetricParser, Scenario};

/// Process start to process stop, one interval per repetition, plus
/// context-switch CPU attribution while the interval is open.
pub struct ProcessTimeParser;

pub(crate) struct ProcessTimeObserver {
    filter: ProcessFilter,
    pid: Option<i32>,
    intervals: IntervalTracker,
    thread_time: ThreadTimeTracker,
}

impl ProcessTimeObserver {
    pub(crate) fn new(platform: Platform, scenario: &Scenario) -> Self {
        ProcessTimeObserver {
            filter: ProcessFilter::new(
                platform,
                scenario.process_name.clone(),
                scenario.pids.clone(),
                scenario.command_line.clone(),
            ),
            pid: None,
            intervals: IntervalTracker::new(),
            thread_time: ThreadTimeTracker::new(),
        }
    }

    pub(crate) fn results(&self) -> &[f64] {
        self.intervals.results()
    }

    pub(crate) fn into_counters(self) -> Vec<Counter> {
        let mut counters = vec![Counter::builder()
            .name("Process Time")
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

impl EventObserver for ProcessTimeObserver {
    fn on_process_start(&mut self, event: &TraceEvent) {
        if self.pid.is_none() && self.filter.matches_start(event) {
            self.pid = Some(event.pid);
            self.intervals.open(CorrelationKey::Process(event.pid), event.timestamp_ms);
        }
    }

    fn on_process_stop(&mut self, event: &TraceEvent) {
        let Some(pid) = self.pid else {
            return;
        };
        if event.pid != pid {
            return;
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

    fn on_context_switch(&mut self, event: &TraceEvent, cs: &ContextSwitch) {
        self.thread_time
            .on_context_switch(self.pid, cs, event.timestamp_ms);
    }
}

impl MetricParser for ProcessTimeParser {
    fn session_plan(&self) -> SessionPlan {
        SessionPlan::new()
            .kernel(KernelKeyword::Process)
            .kernel(KernelKeyword::Thread)
            .kernel(KernelKeyword::ContextSwitch)
    }

    fn parse(
        &self,
        path: &Path,
        platform: Platform,
        scenario: &Scenario,
    ) -> correlator::Result<Vec<Counter>> {
        let mut observer = ProcessTimeObserver::new(platform, scenario);
        run_pass(path, platform, &mut observer)?;
        Ok(observer.into_counters())
    }
}
