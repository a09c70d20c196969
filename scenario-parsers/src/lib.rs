//! Concrete metric parsers: each drives one pass over a capture and
//! emits named counters. Parsers are explicit correlator objects with
//! all pending state held in instance fields; a parser instance serves
//! exactly one capture file.

use std::path::Path;

use tracing::warn;

use correlator::{CaptureFile, Platform, SessionPlan};
use trace_model::Counter;

pub mod hot_reload;
pub mod inner_loop;
pub mod phases;
pub mod process_time;
pub mod time_to_main;

pub use hot_reload::HotReloadParser;
pub use inner_loop::InnerLoopParser;
pub use phases::CompilationPhaseParser;
pub use process_time::ProcessTimeParser;
pub use time_to_main::TimeToMainParser;

/// Caller context identifying the process under measurement: its name,
/// the candidate pids the harness launched, and the command line used
/// to disambiguate processes sharing a name.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub process_name: String,
    pub pids: Vec<i32>,
    pub command_line: Option<String>,
}

impl Scenario {
    pub fn new(process_name: impl Into<String>, pids: Vec<i32>) -> Self {
        Scenario {
            process_name: process_name.into(),
            pids,
            command_line: None,
        }
    }

    pub fn with_command_line(mut self, command_line: impl Into<String>) -> Self {
        self.command_line = Some(command_line.into());
        self
    }
}

pub trait MetricParser {
    /// Capture-session requirements, validated before a session is
    /// configured.
    fn session_plan(&self) -> SessionPlan;

    /// Runs one pass over the capture and emits counters. A missing
    /// capture file is a valid (if undesirable) outcome of the
    /// measurement pipeline and yields empty counters, not an error.
    fn parse(
        &self,
        path: &Path,
        platform: Platform,
        scenario: &Scenario,
    ) -> correlator::Result<Vec<Counter>>;
}

/// Shared entry pattern: open the capture if it exists, otherwise log
/// and leave the observer untouched so it emits empty counters.
pub(crate) fn run_pass(
    path: &Path,
    platform: Platform,
    observer: &mut dyn correlator::EventObserver,
) -> correlator::Result<()> {
    let mut capture = CaptureFile::new(path, platform);
    if !capture.exists() {
        warn!(path = %path.display(), "capture file missing, emitting empty counters");
        return Ok(());
    }
    use correlator::EventSource;
    capture.process(observer)
}
