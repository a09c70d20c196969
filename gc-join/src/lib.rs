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

//! Wake-up latency inside the garbage collector's thread-join barrier.
//!
//! Unlike the streaming correlators this is a post-hoc, whole-trace
//! analysis: locating the restart pair for a last-join requires looking
//! forward in time, and attributing join-ends requires looking backward,
//! so the join events are fully materialized before analysis. The two
//! phases are kept explicit: collect with [`JoinEventCollector`], then
//! analyze with [`JoinAnalysis::wakeup_info`].

use std::collections::{HashMap, HashSet};

use tracing::debug;

use correlator::{EventObserver, EventSource};
use trace_model::{GcJoinData, JoinPhase, JoinType, TraceEvent};

/// One GC join event, materialized out of the stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinEvent {
    pub join_id: i32,
    pub join_type: JoinType,
    pub join_phase: JoinPhase,
    pub tid: i32,
    pub timestamp_ms: f64,
}

/// One other worker thread's measured wake-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreadWakeUp {
    pub tid: i32,
    pub join_end_ms: f64,
    pub wakeup_ms: f64,
}

/// Per-join-group result: the restarting thread, its restart window,
/// and each other GC worker's latency from restart-start to its own
/// join-end. Holds at most (heap count - 1) wake-ups.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinWakeUpInfo {
    pub join_id: i32,
    pub restart_tid: i32,
    pub restart_start_ms: f64,
    pub restart_stop_ms: f64,
    pub last_join_ms: f64,
    pub wakeups: HashMap<i32, ThreadWakeUp>,
}

/// Phase one: gathers every join event belonging to one process.
pub struct JoinEventCollector {
    pid: i32,
    events: Vec<JoinEvent>,
}

impl JoinEventCollector {
    pub fn new(pid: i32) -> Self {
        JoinEventCollector {
            pid,
            events: Vec::new(),
        }
    }

    pub fn into_events(self) -> Vec<JoinEvent> {
        self.events
    }
}

impl EventObserver for JoinEventCollector {
    fn on_gc_join(&mut self, event: &TraceEvent, data: &GcJoinData) {
        if event.pid != self.pid {
            return;
        }
        self.events.push(JoinEvent {
            join_id: data.join_id,
            join_type: data.join_type,
            join_phase: data.join_phase,
            tid: event.tid,
            timestamp_ms: event.timestamp_ms,
        });
    }
}

pub struct JoinAnalysis {
    events: Vec<JoinEvent>,
}

impl JoinAnalysis {
    pub fn new(events: Vec<JoinEvent>) -> Self {
        JoinAnalysis { events }
    }

    /// Materializes join events for `pid` out of a full source pass.
    pub fn from_source(
        source: &mut dyn EventSource,
        pid: i32,
    ) -> Result<Self, correlator::CorrelatorError> {
        let mut collector = JoinEventCollector::new(pid);
        source.process(&mut collector)?;
        Ok(JoinAnalysis::new(collector.into_events()))
    }

    /// Phase two. For each `LastJoin`/`Start` event:
    ///
    /// 1. find the first `Restart` start and end after it on the same
    ///    thread (the thread elected to wake the others);
    /// 2. collect `Join`/`End` events of the same join group from other
    ///    threads after the restart start, ordered by time since
    ///    restart start;
    /// 3. walk them against the remaining GC worker set, recording
    ///    `join_end - restart_start` per thread until the set drains.
    ///
    /// A last-join with no subsequent restart pair (truncated capture)
    /// is skipped.
    pub fn wakeup_info(&self, gc_threads: &HashSet<i32>) -> Vec<JoinWakeUpInfo> {
        let mut infos = Vec::new();

        for last_join in self.events.iter().filter(|e| {
            e.join_type == JoinType::LastJoin && e.join_phase == JoinPhase::Start
        }) {
            let restart_start = self.first_restart(last_join, JoinPhase::Start);
            let restart_end = self.first_restart(last_join, JoinPhase::End);
            let (Some(restart_start), Some(restart_end)) = (restart_start, restart_end) else {
                debug!(
                    join_id = last_join.join_id,
                    tid = last_join.tid,
                    timestamp_ms = last_join.timestamp_ms,
                    "last join without restart pair skipped"
                );
                continue;
            };

            let mut other_joins: Vec<&JoinEvent> = self
                .events
                .iter()
                .filter(|e| {
                    e.join_id == last_join.join_id
                        && e.tid != last_join.tid
                        && e.join_phase == JoinPhase::End
                        && e.join_type == JoinType::Join
                        && e.timestamp_ms > restart_start.timestamp_ms
                })
                .collect();
            other_joins.sort_by(|a, b| {
                let da = a.timestamp_ms - restart_start.timestamp_ms;
                let db = b.timestamp_ms - restart_start.timestamp_ms;
                da.total_cmp(&db)
            });

            let mut info = JoinWakeUpInfo {
                join_id: last_join.join_id,
                restart_tid: restart_start.tid,
                restart_start_ms: restart_start.timestamp_ms,
                restart_stop_ms: restart_end.timestamp_ms,
                last_join_ms: last_join.timestamp_ms,
                wakeups: HashMap::new(),
            };

            let mut remaining: HashSet<i32> = gc_threads.clone();
            for other in other_joins {
                if remaining.is_empty() {
                    break;
                }
                if remaining.remove(&other.tid) {
                    info.wakeups.insert(
                        other.tid,
                        ThreadWakeUp {
                            tid: other.tid,
                            join_end_ms: other.timestamp_ms,
                            wakeup_ms: other.timestamp_ms - restart_start.timestamp_ms,
                        },
                    );
                }
            }

            infos.push(info);
        }

        infos
    }

    fn first_restart(&self, last_join: &JoinEvent, phase: JoinPhase) -> Option<&JoinEvent> {
        self.events.iter().find(|e| {
            e.timestamp_ms > last_join.timestamp_ms
                && e.tid == last_join.tid
                && e.join_phase == phase
                && e.join_type == JoinType::Restart
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use correlator::{Platform, VecSource};
    use rstest::*;
    use trace_model::{EventKind, TraceEvent};

    fn join(
        ts: f64,
        tid: i32,
        join_id: i32,
        join_type: JoinType,
        join_phase: JoinPhase,
    ) -> JoinEvent {
        JoinEvent {
            join_id,
            join_type,
            join_phase,
            tid,
            timestamp_ms: ts,
        }
    }

    const A: i32 = 1;
    const B: i32 = 2;
    const C: i32 = 3;

    fn workers() -> HashSet<i32> {
        [A, B, C].into_iter().collect()
    }

    #[rstest]
    fn wakeup_latency_per_worker_thread() {
        // LastJoin on A at t=0, restart window [5, 6], B joins at 7,
        // C at 9.
        let analysis = JoinAnalysis::new(vec![
            join(0.0, A, 1, JoinType::LastJoin, JoinPhase::Start),
            join(5.0, A, 1, JoinType::Restart, JoinPhase::Start),
            join(6.0, A, 1, JoinType::Restart, JoinPhase::End),
            join(7.0, B, 1, JoinType::Join, JoinPhase::End),
            join(9.0, C, 1, JoinType::Join, JoinPhase::End),
        ]);

        let infos = analysis.wakeup_info(&workers());
        assert_eq!(infos.len(), 1);

        let info = &infos[0];
        assert_eq!(info.join_id, 1);
        assert_eq!(info.restart_tid, A);
        assert_eq!(info.restart_start_ms, 5.0);
        assert_eq!(info.restart_stop_ms, 6.0);
        assert_eq!(info.last_join_ms, 0.0);

        assert_eq!(info.wakeups[&B].wakeup_ms, 2.0);
        assert_eq!(info.wakeups[&C].wakeup_ms, 4.0);
        assert!(!info.wakeups.contains_key(&A));
    }

    #[rstest]
    fn join_ends_before_restart_start_are_not_wakeups() {
        let analysis = JoinAnalysis::new(vec![
            join(0.0, A, 1, JoinType::LastJoin, JoinPhase::Start),
            // B's join-end predates the restart: a stale event from the
            // previous barrier crossing.
            join(3.0, B, 1, JoinType::Join, JoinPhase::End),
            join(5.0, A, 1, JoinType::Restart, JoinPhase::Start),
            join(6.0, A, 1, JoinType::Restart, JoinPhase::End),
            join(9.0, C, 1, JoinType::Join, JoinPhase::End),
        ]);

        let infos = analysis.wakeup_info(&workers());
        assert_eq!(infos.len(), 1);
        assert!(!infos[0].wakeups.contains_key(&B));
        assert_eq!(infos[0].wakeups[&C].wakeup_ms, 4.0);
    }

    #[rstest]
    fn each_thread_is_counted_once() {
        let analysis = JoinAnalysis::new(vec![
            join(0.0, A, 1, JoinType::LastJoin, JoinPhase::Start),
            join(5.0, A, 1, JoinType::Restart, JoinPhase::Start),
            join(6.0, A, 1, JoinType::Restart, JoinPhase::End),
            join(7.0, B, 1, JoinType::Join, JoinPhase::End),
            join(8.0, B, 1, JoinType::Join, JoinPhase::End),
        ]);

        let infos = analysis.wakeup_info(&workers());
        assert_eq!(infos[0].wakeups.len(), 1);
        assert_eq!(infos[0].wakeups[&B].wakeup_ms, 2.0);
    }

    #[rstest]
    fn truncated_capture_without_restart_is_skipped() {
        let analysis = JoinAnalysis::new(vec![
            join(0.0, A, 1, JoinType::LastJoin, JoinPhase::Start),
            join(7.0, B, 1, JoinType::Join, JoinPhase::End),
        ]);

        assert!(analysis.wakeup_info(&workers()).is_empty());
    }

    #[rstest]
    fn join_groups_are_analyzed_independently() {
        let analysis = JoinAnalysis::new(vec![
            join(0.0, A, 1, JoinType::LastJoin, JoinPhase::Start),
            join(5.0, A, 1, JoinType::Restart, JoinPhase::Start),
            join(6.0, A, 1, JoinType::Restart, JoinPhase::End),
            join(7.0, B, 1, JoinType::Join, JoinPhase::End),
            join(20.0, B, 2, JoinType::LastJoin, JoinPhase::Start),
            join(25.0, B, 2, JoinType::Restart, JoinPhase::Start),
            join(26.0, B, 2, JoinType::Restart, JoinPhase::End),
            join(28.0, A, 2, JoinType::Join, JoinPhase::End),
        ]);

        let infos = analysis.wakeup_info(&workers());
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].restart_tid, A);
        assert_eq!(infos[1].restart_tid, B);
        assert_eq!(infos[1].wakeups[&A].wakeup_ms, 3.0);
    }

    #[rstest]
    fn collector_filters_by_pid() {
        let gc = |ts: f64, pid: i32, tid: i32, join_type, join_phase| {
            TraceEvent::new(
                ts,
                pid,
                tid,
                EventKind::GcJoin(trace_model::GcJoinData {
                    join_id: 1,
                    join_type,
                    join_phase,
                }),
            )
        };

        let events = vec![
            gc(0.0, 10, A, JoinType::LastJoin, JoinPhase::Start),
            gc(1.0, 99, A, JoinType::Restart, JoinPhase::Start),
            gc(5.0, 10, A, JoinType::Restart, JoinPhase::Start),
            gc(6.0, 10, A, JoinType::Restart, JoinPhase::End),
            gc(7.0, 10, B, JoinType::Join, JoinPhase::End),
        ];

        let mut source = VecSource::new(events, Platform::Windows);
        let analysis = JoinAnalysis::from_source(&mut source, 10).unwrap();
        let infos = analysis.wakeup_info(&workers());

        assert_eq!(infos.len(), 1);
        // The foreign process's earlier restart was filtered out.
        assert_eq!(infos[0].restart_start_ms, 5.0);
    }
}
