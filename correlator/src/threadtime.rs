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

use std::collections::HashMap;

use trace_model::{ContextSwitch, Counter};

/// Context-switch based CPU attribution for the tracked process.
///
/// A switch-in records the thread's in-timestamp; a switch-out of a
/// thread with a recorded switch-in adds the on-cpu slice to the
/// running total. Switches are only accounted while a measurement
/// interval is open for the tracked pid; at interval close the total
/// becomes one result of the secondary counter and resets.
///
/// Context-switch events only exist on the Windows tracing path, so on
/// other platforms every total stays zero and `counter` omits the
/// counter from output.
#[derive(Debug, Default)]
pub struct ThreadTimeTracker {
    ins: HashMap<i32, f64>,
    total: f64,
    totals: Vec<f64>,
}

impl ThreadTimeTracker {
    pub fn new() -> Self {
        ThreadTimeTracker::default()
    }

    /// `tracked_pid` is the pid of the currently open measurement
    /// interval, or `None` outside any interval.
    pub fn on_context_switch(
        &mut self,
        tracked_pid: Option<i32>,
        cs: &ContextSwitch,
        timestamp_ms: f64,
    ) {
        let Some(pid) = tracked_pid else {
            return;
        };
        if cs.new_pid != pid && cs.old_pid != pid {
            return;
        }
        if cs.old_pid == pid {
            if let Some(in_ts) = self.ins.remove(&cs.old_tid) {
                self.total += timestamp_ms - in_ts;
            }
        } else {
            self.ins.insert(cs.new_tid, timestamp_ms);
        }
    }

    /// Captures the running total as one result and resets it for the
    /// next repetition.
    pub fn close_interval(&mut self) {
        self.totals.push(self.total);
        self.total = 0.0;
    }

    pub fn totals(&self) -> &[f64] {
        &self.totals
    }

    /// Drains the closed totals; the running total and recorded
    /// switch-ins stay, so an interval spanning the drain keeps
    /// accumulating.
    pub fn take_totals(&mut self) -> Vec<f64> {
        std::mem::take(&mut self.totals)
    }

    /// The secondary counter, or `None` when any repetition measured
    /// zero (context switches unavailable in this capture).
    pub fn counter(&self, name: &str) -> Option<Counter> {
        if self.totals.is_empty() || self.totals.iter().any(|t| *t == 0.0) {
            return None;
        }
        Some(
            Counter::builder()
                .name(name)
                .top_counter(true)
                .results(self.totals.clone())
                .build(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    fn cs(old_pid: i32, old_tid: i32, new_pid: i32, new_tid: i32) -> ContextSwitch {
        ContextSwitch {
            old_pid,
            old_tid,
            new_pid,
            new_tid,
        }
    }

    #[rstest]
    fn accumulates_on_cpu_slices_per_thread() {
        let mut tracker = ThreadTimeTracker::new();
        let pid = Some(10);

        tracker.on_context_switch(pid, &cs(1, 1, 10, 100), 0.0);
        tracker.on_context_switch(pid, &cs(10, 100, 1, 1), 4.0);
        tracker.on_context_switch(pid, &cs(1, 1, 10, 101), 5.0);
        tracker.on_context_switch(pid, &cs(10, 101, 1, 1), 8.0);
        tracker.close_interval();

        assert_eq!(tracker.totals(), &[7.0]);
    }

    #[rstest]
    fn switches_outside_a_measurement_interval_are_ignored() {
        let mut tracker = ThreadTimeTracker::new();

        tracker.on_context_switch(None, &cs(1, 1, 10, 100), 0.0);
        tracker.on_context_switch(Some(10), &cs(10, 100, 1, 1), 4.0);
        tracker.close_interval();

        // The switch-in was never recorded, so the switch-out finds
        // nothing to pair with.
        assert_eq!(tracker.totals(), &[0.0]);
    }

    #[rstest]
    fn unrelated_processes_are_ignored() {
        let mut tracker = ThreadTimeTracker::new();
        let pid = Some(10);

        tracker.on_context_switch(pid, &cs(20, 200, 30, 300), 1.0);
        tracker.on_context_switch(pid, &cs(1, 1, 10, 100), 2.0);
        tracker.on_context_switch(pid, &cs(10, 100, 20, 200), 6.0);
        tracker.close_interval();

        assert_eq!(tracker.totals(), &[4.0]);
    }

    #[rstest]
    fn total_resets_between_repetitions() {
        let mut tracker = ThreadTimeTracker::new();

        tracker.on_context_switch(Some(10), &cs(1, 1, 10, 100), 0.0);
        tracker.on_context_switch(Some(10), &cs(10, 100, 1, 1), 3.0);
        tracker.close_interval();

        tracker.on_context_switch(Some(11), &cs(1, 1, 11, 110), 10.0);
        tracker.on_context_switch(Some(11), &cs(11, 110, 1, 1), 15.0);
        tracker.close_interval();

        assert_eq!(tracker.totals(), &[3.0, 5.0]);
    }

    #[rstest]
    fn take_totals_keeps_the_running_interval_accumulating() {
        let mut tracker = ThreadTimeTracker::new();

        tracker.on_context_switch(Some(10), &cs(1, 1, 10, 100), 0.0);
        tracker.on_context_switch(Some(10), &cs(10, 100, 1, 1), 3.0);
        tracker.close_interval();

        // A new interval is in flight when the totals are drained.
        tracker.on_context_switch(Some(11), &cs(1, 1, 11, 110), 10.0);
        assert_eq!(tracker.take_totals(), vec![3.0]);

        tracker.on_context_switch(Some(11), &cs(11, 110, 1, 1), 16.0);
        tracker.close_interval();
        assert_eq!(tracker.totals(), &[6.0]);
    }

    #[rstest]
    fn counter_omitted_when_any_total_is_zero() {
        let mut tracker = ThreadTimeTracker::new();
        tracker.close_interval();
        assert!(tracker.counter("Time on Thread").is_none());

        let mut tracker = ThreadTimeTracker::new();
        tracker.on_context_switch(Some(10), &cs(1, 1, 10, 100), 0.0);
        tracker.on_context_switch(Some(10), &cs(10, 100, 1, 1), 2.0);
        tracker.close_interval();
        let counter = tracker.counter("Time on Thread").unwrap();
        assert_eq!(counter.results, vec![2.0]);
        assert!(counter.top_counter);
    }
}
