//! Data model shared by the trace sources, the correlation core, and the
//! metric parsers: timestamped trace events with typed payloads, and the
//! named counters a parse pass emits.

use std::collections::HashMap;

use bon::Builder;
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

pub mod capture;

pub use capture::{
    read_capture, write_capture, CaptureError, CaptureFormat, CaptureReader, CaptureWriter,
};

/// Typed name/value pairs attached to an event, split by value type the
/// same way event labels are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
pub struct Payload {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub strings: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub ints: HashMap<String, i64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub bools: HashMap<String, bool>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub floats: HashMap<String, f64>,
}

impl Payload {
    pub fn new() -> Self {
        Payload::default()
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.strings.get(key).map(String::as_str)
    }

    /// Missing payload fields are tolerated with a caller-supplied
    /// sentinel rather than an error (e.g. `Priority` absent -> -1).
    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        self.ints.get(key).copied().unwrap_or(default)
    }

    pub fn float_or(&self, key: &str, default: f64) -> f64 {
        self.floats.get(key).copied().unwrap_or(default)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.bools.get(key).copied().unwrap_or(default)
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.ints.is_empty() && self.bools.is_empty() && self.floats.is_empty()
    }
}

/// Identifies one provider event. Windows-style sources carry event
/// names, LTTng-style sources only carry numeric IDs; a source exposes
/// exactly one of the two bindings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum EventId {
    Named(String),
    Numeric(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct ContextSwitch {
    pub old_pid: i32,
    pub old_tid: i32,
    pub new_pid: i32,
    pub new_tid: i32,
}

/// GC thread-barrier primitive carried by `EventKind::GcJoin`. A `Join`
/// is a worker waiting at the barrier, a `Restart` is the signal that
/// releases the waiters, a `LastJoin` is the final arriver that gets
/// elected to issue the restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum JoinType {
    Join,
    Restart,
    LastJoin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum JoinPhase {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct GcJoinData {
    pub join_id: i32,
    pub join_type: JoinType,
    pub join_phase: JoinPhase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
pub enum EventKind {
    ProcessStart {
        name: String,
        command_line: String,
    },
    ProcessStop,
    ContextSwitch(ContextSwitch),
    Provider {
        provider: String,
        event: EventId,
    },
    GcJoin(GcJoinData),
}

/// One timestamped trace record. Timestamps are relative milliseconds,
/// monotonically non-decreasing within a source but interleaved across
/// processes and threads. Events are immutable once produced and are not
/// retained past the observer callback that receives them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize)]
pub struct TraceEvent {
    pub timestamp_ms: f64,
    pub pid: i32,
    pub tid: i32,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    pub payload: Payload,
}

impl TraceEvent {
    pub fn new(timestamp_ms: f64, pid: i32, tid: i32, kind: EventKind) -> Self {
        TraceEvent {
            timestamp_ms,
            pid,
            tid,
            kind,
            payload: Payload::new(),
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Process name as recorded on the event, if any. Start events carry
    /// it inline; other events may carry it as a payload field.
    pub fn process_name(&self) -> Option<&str> {
        match &self.kind {
            EventKind::ProcessStart { name, .. } => Some(name.as_str()),
            _ => self.payload.string("name"),
        }
    }
}

/// One named metric produced by a parse pass: a unit label, display
/// flags, and the raw per-repetition results. No statistical reduction
/// happens here; an empty result array means zero intervals matched,
/// which is a valid outcome distinct from a measured zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct Counter {
    #[builder(into)]
    pub name: String,
    #[builder(into, default = String::from("ms"))]
    pub unit: String,
    #[builder(default)]
    pub default_counter: bool,
    #[builder(default)]
    pub top_counter: bool,
    #[builder(default)]
    pub higher_is_better: bool,
    #[builder(default)]
    pub results: Vec<f64>,
}
