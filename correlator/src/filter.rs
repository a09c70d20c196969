use std::path::Path;

use trace_model::{EventKind, TraceEvent};

use crate::source::Platform;

/// Command lines longer than this are compared on their first 512
/// characters only; the kernel start-event payload truncates there.
const COMMAND_LINE_BUFFER_MAX: usize = 512;

/// Maximum process-name length in Linux kernel event payloads (comm).
const LINUX_COMM_MAX: usize = 15;

/// Longest prefix of `s` holding at most `max_chars` characters. Char
/// based rather than byte based so a multi-byte character at the limit
/// cannot split.
fn char_prefix(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Decides whether a process-start event belongs to the process under
/// measurement: case-insensitive name equality, membership in the
/// caller-supplied candidate pid set, and optional command-line
/// equality to disambiguate processes sharing a name. When several
/// processes satisfy the predicate simultaneously, the first match
/// wins per key.
#[derive(Debug, Clone)]
pub struct ProcessFilter {
    platform: Platform,
    process_name: String,
    pids: Vec<i32>,
    command_line: Option<String>,
}

impl ProcessFilter {
    pub fn new(
        platform: Platform,
        process_name: impl Into<String>,
        pids: Vec<i32>,
        command_line: Option<String>,
    ) -> Self {
        ProcessFilter {
            platform,
            process_name: process_name.into(),
            pids,
            command_line,
        }
    }

    pub fn matches_start(&self, event: &TraceEvent) -> bool {
        let (name, command_line) = match &event.kind {
            EventKind::ProcessStart { name, command_line } => (name.as_str(), command_line.as_str()),
            _ => return false,
        };
        self.match_command_line(command_line)
            && self.match_name(name, event)
            && self.match_pid(event)
    }

    /// Pid-only membership check, used by stop/marker callbacks that
    /// correlate on an already-matched pid.
    pub fn contains_pid(&self, pid: i32) -> bool {
        self.pids.contains(&pid)
    }

    fn match_command_line(&self, payload_command_line: &str) -> bool {
        // Pids can be recycled within one session, so the command line
        // is matched too where the trace format records it (Windows
        // only; the Linux payload has no command line).
        let Some(expected) = &self.command_line else {
            return true;
        };
        if self.platform != Platform::Windows {
            return true;
        }
        let mut expected = expected.as_str();
        let mut actual = payload_command_line;
        if actual.chars().count() >= COMMAND_LINE_BUFFER_MAX
            && expected.chars().count() >= COMMAND_LINE_BUFFER_MAX
        {
            expected = char_prefix(expected, COMMAND_LINE_BUFFER_MAX);
            actual = char_prefix(actual, COMMAND_LINE_BUFFER_MAX);
        }
        expected.trim() == actual.trim()
    }

    fn match_name(&self, event_name: &str, event: &TraceEvent) -> bool {
        if self.platform == Platform::Windows {
            return self.process_name.eq_ignore_ascii_case(event_name);
        }
        if self.process_name.chars().count() < LINUX_COMM_MAX {
            return self.process_name.eq_ignore_ascii_case(event_name);
        }
        match event.payload.string("FileName") {
            // Full name is recoverable from the executable path.
            Some(file_name) => Path::new(file_name)
                .file_name()
                .and_then(|f| f.to_str())
                .map(|f| self.process_name == f)
                .unwrap_or(false),
            // Otherwise only the truncated comm is available.
            None => {
                char_prefix(&self.process_name, LINUX_COMM_MAX).eq_ignore_ascii_case(event_name)
            }
        }
    }

    fn match_pid(&self, event: &TraceEvent) -> bool {
        if !self.pids.contains(&event.pid) {
            return false;
        }
        if self.platform == Platform::Windows {
            return true;
        }
        // On Linux both pid and tid must match; some providers record
        // the thread id in a payload field instead.
        if self.pids.contains(&event.tid) {
            return true;
        }
        let payload_tid = event.payload.int_or("PayloadThreadID", -1);
        i32::try_from(payload_tid)
            .map(|tid| self.pids.contains(&tid))
            .unwrap_or(false)
    }
}
