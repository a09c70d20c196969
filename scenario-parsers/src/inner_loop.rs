use std::path::Path;

use correlator::{
    CorrelationKey, EventObserver, IntervalTracker, KernelKeyword, MarkerMatcher, Platform,
    ProcessFilter, SessionPlan, ThreadTimeTracker,
};
use trace_model::{ContextSwitch, Counter, TraceEvent};

use crate::{run_pass, MetricParser, Scenario};

pub const PROVIDER_NAME: &str = "InnerLoopMarkerEventSource";
pub const SPLIT_EVENT_NAME: &str = "Split";
pub const SPLIT_EVENT_ID: u16 = 1;
pub const END_ITERATION_EVENT_NAME: &str = "EndIteration";
pub const END_ITERATION_EVENT_ID: u16 = 2;

/// A/B startup measurement. Each iteration runs the process twice (a
/// cold build-and-run, then a warm rerun); a `Split` marker separates
/// the two halves and `EndIteration` closes the pair. Startup and
/// thread-time results collect into per-half series plus pairwise diff
/// counters.
pub struct InnerLoopParser;

struct InnerLoopObserver {
    filter: ProcessFilter,
    split: MarkerMatcher,
    end_iteration: MarkerMatcher,
    pid: Option<i32>,
    intervals: IntervalTracker,
    thread_time: ThreadTimeTracker,
    first_runs: Vec<f64>,
    second_runs: Vec<f64>,
    first_thread: Vec<f64>,
    second_thread: Vec<f64>,
}

impl InnerLoopObserver {
    fn new(platform: Platform, scenario: &Scenario) -> Self {
        InnerLoopObserver {
            filter: ProcessFilter::new(
                platform,
                scenario.process_name.clone(),
                scenario.pids.clone(),
                scenario.command_line.clone(),
            ),
            split: MarkerMatcher::bind(platform, PROVIDER_NAME, SPLIT_EVENT_NAME, SPLIT_EVENT_ID),
            end_iteration: MarkerMatcher::bind(
                platform,
                PROVIDER_NAME,
                END_ITERATION_EVENT_NAME,
                END_ITERATION_EVENT_ID,
            ),
            pid: None,
            intervals: IntervalTracker::new(),
            thread_time: ThreadTimeTracker::new(),
            first_runs: Vec::new(),
            second_runs: Vec::new(),
            first_thread: Vec::new(),
            second_thread: Vec::new(),
        }
    }

    /// Moves the completed measurements into the given half. Pending
    /// state stays: a start/stop pair spanning the marker completes
    /// normally and lands in the following half.
    fn flush_into(&mut self, first_half: bool) {
        let results = self.intervals.take_results();
        let totals = self.thread_time.take_totals();
        let (runs, thread) = if first_half {
            (&mut self.first_runs, &mut self.first_thread)
        } else {
            (&mut self.second_runs, &mut self.second_thread)
        };
        runs.extend(results);
        thread.extend(totals);
    }

    fn into_counters(self) -> Vec<Counter> {
        let diff: Vec<f64> = self
            .first_runs
            .iter()
            .zip(&self.second_runs)
            .map(|(first, second)| first - second)
            .collect();

        let mut counters = vec![
            Counter::builder()
                .name("Generic Startup Diff")
                .default_counter(true)
                .top_counter(true)
                .results(diff)
                .build(),
            Counter::builder()
                .name("Generic Startup First Run")
                .top_counter(true)
                .results(self.first_runs)
                .build(),
            Counter::builder()
                .name("Generic Startup Second Run")
                .top_counter(true)
                .results(self.second_runs)
                .build(),
        ];

        let thread_measured = !self.first_thread.is_empty()
            && self.first_thread.len() == self.second_thread.len()
            && self
                .first_thread
                .iter()
                .chain(&self.second_thread)
                .all(|t| *t != 0.0);
        if thread_measured {
            let thread_diff: Vec<f64> = self
                .first_thread
                .iter()
                .zip(&self.second_thread)
                .map(|(first, second)| first - second)
                .collect();
            counters.push(
                Counter::builder()
                    .name("Time on Thread Diff")
                    .top_counter(true)
                    .results(thread_diff)
                    .build(),
            );
        }
        counters
    }
}

impl EventObserver for InnerLoopObserver {
    fn on_process_start(&mut self, event: &TraceEvent) {
        if self.pid.is_none() && self.filter.matches_start(event) {
            self.pid = Some(event.pid);
            self.intervals
                .open(CorrelationKey::Process(event.pid), event.timestamp_ms);
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

    fn on_provider_event(&mut self, event: &TraceEvent) {
        if self.split.matches(event) {
            self.flush_into(true);
        } else if self.end_iteration.matches(event) {
            self.flush_into(false);
        }
    }
}

impl MetricParser for InnerLoopParser {
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
        let mut observer = InnerLoopObserver::new(platform, scenario);
        run_pass(path, platform, &mut observer)?;
        Ok(observer.into_counters())
    }
}
