use std::path::Path;

use correlator::{
    EventObserver, KernelKeyword, MarkerMatcher, Platform, SegmentAccumulator, SessionPlan,
};
use trace_model::{ContextSwitch, Counter, TraceEvent};

use crate::process_time::ProcessTimeObserver;
use crate::{run_pass, MetricParser, Scenario};

pub const PROVIDER_NAME: &str = "Microsoft-ILCompiler-Perf";

const PHASES: [&str; 4] = ["Loading", "Emitting", "Jit", "Compilation"];

/// Ahead-of-time compiler phase timings. Each phase fires as many
/// disjoint start/stop marker pairs per compiler invocation; the
/// accumulator collapses them into one scalar per repetition. Wall
/// process time rides along in the same pass.
pub struct CompilationPhaseParser;

struct PhaseTracker {
    name: &'static str,
    start: MarkerMatcher,
    stop: MarkerMatcher,
    segments: SegmentAccumulator,
}

impl PhaseTracker {
    fn new(name: &'static str) -> Self {
        // The compiler's in-process provider always carries event
        // names, so the marker binding is platform-independent.
        PhaseTracker {
            name,
            start: MarkerMatcher::named(PROVIDER_NAME, &format!("{name}/Start")),
            stop: MarkerMatcher::named(PROVIDER_NAME, &format!("{name}/Stop")),
            segments: SegmentAccumulator::new(),
        }
    }

    fn observe(&mut self, event: &TraceEvent) {
        if self.start.matches(event) {
            self.segments.on_start(event.pid, event.timestamp_ms);
        } else if self.stop.matches(event) {
            self.segments.on_stop(event.pid, event.timestamp_ms);
        }
    }

    fn into_counter(self) -> Counter {
        Counter::builder()
            .name(format!("{} Interval", self.name))
            .top_counter(true)
            .results(self.segments.into_intervals())
            .build()
    }
}

struct PhaseObserver {
    pids: Vec<i32>,
    phases: Vec<PhaseTracker>,
    process_time: ProcessTimeObserver,
}

impl PhaseObserver {
    fn new(platform: Platform, scenario: &Scenario) -> Self {
        PhaseObserver {
            pids: scenario.pids.clone(),
            phases: PHASES.iter().copied().map(PhaseTracker::new).collect(),
            process_time: ProcessTimeObserver::new(platform, scenario),
        }
    }

    fn into_counters(self) -> Vec<Counter> {
        let mut counters: Vec<Counter> = self
            .phases
            .into_iter()
            .map(PhaseTracker::into_counter)
            .collect();
        counters.extend(self.process_time.into_counters());
        counters
    }
}

impl EventObserver for PhaseObserver {
    fn on_process_start(&mut self, event: &TraceEvent) {
        self.process_time.on_process_start(event);
    }

    fn on_process_stop(&mut self, event: &TraceEvent) {
        self.process_time.on_process_stop(event);
    }

    fn on_context_switch(&mut self, event: &TraceEvent, cs: &ContextSwitch) {
        self.process_time.on_context_switch(event, cs);
    }

    fn on_provider_event(&mut self, event: &TraceEvent) {
        if !self.pids.contains(&event.pid) {
            return;
        }
        for phase in &mut self.phases {
            phase.observe(event);
        }
    }
}

impl MetricParser for CompilationPhaseParser {
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
        let mut observer = PhaseObserver::new(platform, scenario);
        run_pass(path, platform, &mut observer)?;
        Ok(observer.into_counters())
    }
}
