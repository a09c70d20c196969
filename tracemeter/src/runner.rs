use std::collections::HashSet;
use std::path::Path;

use clap::ValueEnum;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use correlator::{CaptureFile, Platform};
use gc_join::{JoinAnalysis, JoinWakeUpInfo};
use scenario_parsers::{
    CompilationPhaseParser, HotReloadParser, InnerLoopParser, MetricParser, ProcessTimeParser,
    Scenario, TimeToMainParser,
};
use trace_model::Counter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParserKind {
    ProcessTime,
    TimeToMain,
    CompilationPhases,
    HotReload,
    InnerLoop,
}

impl ParserKind {
    pub fn parser(self) -> Box<dyn MetricParser> {
        match self {
            ParserKind::ProcessTime => Box::new(ProcessTimeParser),
            ParserKind::TimeToMain => Box::new(TimeToMainParser),
            ParserKind::CompilationPhases => Box::new(CompilationPhaseParser),
            ParserKind::HotReload => Box::new(HotReloadParser),
            ParserKind::InnerLoop => Box::new(InnerLoopParser),
        }
    }
}

/// Validates the parser's session plan against the platform, then runs
/// one pass over the capture.
pub fn run_parser(
    kind: ParserKind,
    capture: &Path,
    platform: Platform,
    scenario: &Scenario,
) -> Result<Vec<Counter>> {
    let parser = kind.parser();
    parser
        .session_plan()
        .validate(platform)
        .context("session plan rejected for platform")?;
    let counters = parser
        .parse(capture, platform, scenario)
        .with_context(|| format!("failed to parse capture path={}", capture.display()))?;
    Ok(counters)
}

pub fn run_gc_wakeups(
    capture: &Path,
    platform: Platform,
    pid: i32,
    threads: &[i32],
) -> Result<Vec<JoinWakeUpInfo>> {
    let mut source = CaptureFile::new(capture, platform);
    if !source.exists() {
        warn!(path = %capture.display(), "capture file missing, skipping gc wake-up analysis");
        return Ok(Vec::new());
    }
    let analysis = JoinAnalysis::from_source(&mut source, pid)
        .with_context(|| format!("failed to collect join events path={}", capture.display()))?;
    let gc_threads: HashSet<i32> = threads.iter().copied().collect();
    Ok(analysis.wakeup_info(&gc_threads))
}
