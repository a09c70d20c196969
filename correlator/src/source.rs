// Copyright (C) 2025 Category Labs, Inc.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::path::PathBuf;

use tracing::debug;

use trace_model::{CaptureReader, ContextSwitch, EventKind, GcJoinData, TraceEvent};

use crate::Result;

/// Platform the capture was recorded on. Selected once per source; it
/// decides the provider binding and whether context-switch events are
/// present at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
}

/// The two shapes a provider event can take: named events on the
/// Windows tracing path, numeric event IDs on the Linux one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderBinding {
    Named,
    Numeric,
}

impl Platform {
    pub fn binding(&self) -> ProviderBinding {
        match self {
            Platform::Windows => ProviderBinding::Named,
            Platform::Linux => ProviderBinding::Numeric,
        }
    }

    pub fn has_context_switches(&self) -> bool {
        matches!(self, Platform::Windows)
    }
}

/// Receives events during a source pass. Callbacks fire synchronously
/// in timestamp order on the calling thread; an observer keeps all of
/// its correlation state in its own fields and is discarded after one
/// pass.
pub trait EventObserver {
    fn on_process_start(&mut self, _event: &TraceEvent) {}
    fn on_process_stop(&mut self, _event: &TraceEvent) {}
    fn on_context_switch(&mut self, _event: &TraceEvent, _cs: &ContextSwitch) {}
    fn on_provider_event(&mut self, _event: &TraceEvent) {}
    fn on_gc_join(&mut self, _event: &TraceEvent, _data: &GcJoinData) {}
}

/// A single forward pass over a totally time-ordered event sequence.
/// No seeking, no replay; `process` runs to end of stream.
pub trait EventSource {
    fn platform(&self) -> Platform;
    fn process(&mut self, observer: &mut dyn EventObserver) -> Result<()>;
}

pub(crate) fn dispatch(event: &TraceEvent, observer: &mut dyn EventObserver) {
    match &event.kind {
        EventKind::ProcessStart { .. } => observer.on_process_start(event),
        EventKind::ProcessStop => observer.on_process_stop(event),
        EventKind::ContextSwitch(cs) => observer.on_context_switch(event, cs),
        EventKind::Provider { .. } => observer.on_provider_event(event),
        EventKind::GcJoin(data) => observer.on_gc_join(event, data),
    }
}

/// File-backed event source over either capture format.
pub struct CaptureFile {
    path: PathBuf,
    platform: Platform,
}

impl CaptureFile {
    pub fn new(path: impl Into<PathBuf>, platform: Platform) -> Self {
        CaptureFile {
            path: path.into(),
            platform,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl EventSource for CaptureFile {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn process(&mut self, observer: &mut dyn EventObserver) -> Result<()> {
        let mut reader = CaptureReader::open(&self.path)?;
        let mut last_ts = f64::NEG_INFINITY;
        let mut count = 0usize;
        while let Some(event) = reader.read_event()? {
            if event.timestamp_ms < last_ts {
                debug!(
                    timestamp_ms = event.timestamp_ms,
                    last_ts, "event timestamp regressed"
                );
            }
            last_ts = event.timestamp_ms;
            dispatch(&event, observer);
            count += 1;
        }
        debug!(path = %self.path.display(), count, "capture pass complete");
        Ok(())
    }
}

/// In-memory event source, used by tests and by the materialization
/// phase of post-hoc analyses.
pub struct VecSource {
    events: Vec<TraceEvent>,
    platform: Platform,
}

impl VecSource {
    pub fn new(events: Vec<TraceEvent>, platform: Platform) -> Self {
        VecSource { events, platform }
    }
}

impl EventSource for VecSource {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn process(&mut self, observer: &mut dyn EventObserver) -> Result<()> {
        for event in &self.events {
            dispatch(event, observer);
        }
        Ok(())
    }
}
