//! Multi-segment phase accumulation: phases like JIT or linker task
//! time occur as many disjoint start/stop pairs within one logical
//! repetition and must collapse into a single scalar per repetition.

/// Decides whether a stop event still belongs to the previous
/// repetition. The trace formats this accumulator serves carry no
/// explicit repetition marker, so the default compares consecutive
/// process ids; formats with a real boundary event (`Split`,
/// `EndIteration`) bypass the accumulator entirely.
pub trait RepetitionBoundary {
    fn same_repetition(&self, prev_pid: i32, pid: i32) -> bool;
}

/// Consecutive-pid heuristic: a repetition boundary is assumed exactly
/// when the process id changes. Wrong only if two back-to-back
/// repetitions reuse the same pid, which the pid allocator makes
/// unlikely within one capture.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsecutivePid;

impl RepetitionBoundary for ConsecutivePid {
    fn same_repetition(&self, prev_pid: i32, pid: i32) -> bool {
        prev_pid == pid
    }
}

/// Accumulates disjoint start/stop durations into one result per
/// repetition. The result sequence is treated as a stack: a stop that
/// falls in the same repetition as the previous one adds its duration
/// into the last emitted value instead of pushing a new one.
#[derive(Debug)]
pub struct SegmentAccumulator<B = ConsecutivePid> {
    boundary: B,
    pid: Option<i32>,
    prev_pid: Option<i32>,
    start: f64,
    interval: f64,
    intervals: Vec<f64>,
}

impl SegmentAccumulator<ConsecutivePid> {
    pub fn new() -> Self {
        SegmentAccumulator::with_boundary(ConsecutivePid)
    }
}

impl Default for SegmentAccumulator<ConsecutivePid> {
    fn default() -> Self {
        SegmentAccumulator::new()
    }
}

impl<B: RepetitionBoundary> SegmentAccumulator<B> {
    pub fn with_boundary(boundary: B) -> Self {
        SegmentAccumulator {
            boundary,
            pid: None,
            prev_pid: None,
            start: 0.0,
            interval: 0.0,
            intervals: Vec::new(),
        }
    }

    /// Opens a segment. First-start-wins: ignored while a segment is
    /// already pending. The caller has already applied its process
    /// predicate to the event.
    pub fn on_start(&mut self, pid: i32, timestamp_ms: f64) {
        if self.pid.is_some() {
            return;
        }
        let same = self
            .prev_pid
            .map(|prev| self.boundary.same_repetition(prev, pid))
            .unwrap_or(false);
        if !same {
            self.interval = 0.0;
        }
        self.pid = Some(pid);
        self.start = timestamp_ms;
    }

    /// Closes the pending segment if `pid` matches it.
    pub fn on_stop(&mut self, pid: i32, timestamp_ms: f64) {
        let Some(pending) = self.pid else {
            return;
        };
        if pending != pid {
            return;
        }
        let duration = timestamp_ms - self.start;
        self.interval += duration;
        let same = self
            .prev_pid
            .map(|prev| self.boundary.same_repetition(prev, pid))
            .unwrap_or(false);
        if same {
            // Still within the previous repetition: fold into its value.
            let last = self.intervals.pop().unwrap_or(0.0);
            self.intervals.push(last + duration);
        } else {
            self.intervals.push(self.interval);
        }
        self.start = 0.0;
        self.prev_pid = Some(pending);
        self.pid = None;
    }

    pub fn intervals(&self) -> &[f64] {
        &self.intervals
    }

    pub fn into_intervals(self) -> Vec<f64> {
        self.intervals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    fn disjoint_segments_in_one_repetition_sum_to_one_result() {
        let mut acc = SegmentAccumulator::new();

        // Three Jit segments inside one compiler process.
        acc.on_start(10, 0.0);
        acc.on_stop(10, 4.0);
        acc.on_start(10, 10.0);
        acc.on_stop(10, 13.0);
        acc.on_start(10, 20.0);
        acc.on_stop(10, 22.0);

        assert_eq!(acc.intervals(), &[9.0]);
    }

    #[rstest]
    fn new_pid_starts_a_new_repetition() {
        let mut acc = SegmentAccumulator::new();

        acc.on_start(10, 0.0);
        acc.on_stop(10, 5.0);
        acc.on_start(10, 6.0);
        acc.on_stop(10, 8.0);

        acc.on_start(11, 100.0);
        acc.on_stop(11, 104.0);

        assert_eq!(acc.intervals(), &[7.0, 4.0]);
    }

    #[rstest]
    fn orphan_stop_is_ignored() {
        let mut acc = SegmentAccumulator::new();
        acc.on_stop(10, 5.0);
        assert!(acc.intervals().is_empty());

        acc.on_start(10, 10.0);
        acc.on_stop(99, 12.0);
        assert!(acc.intervals().is_empty());
        acc.on_stop(10, 14.0);
        assert_eq!(acc.intervals(), &[4.0]);
    }

    #[rstest]
    fn orphan_start_at_stream_end_emits_nothing() {
        let mut acc = SegmentAccumulator::new();
        acc.on_start(10, 0.0);
        acc.on_stop(10, 2.0);
        acc.on_start(10, 5.0);
        assert_eq!(acc.intervals(), &[2.0]);
    }

    #[rstest]
    fn duplicate_start_keeps_first_timestamp() {
        let mut acc = SegmentAccumulator::new();
        acc.on_start(10, 0.0);
        acc.on_start(10, 50.0);
        acc.on_stop(10, 60.0);
        assert_eq!(acc.intervals(), &[60.0]);
    }

    struct NeverSame;

    impl RepetitionBoundary for NeverSame {
        fn same_repetition(&self, _prev_pid: i32, _pid: i32) -> bool {
            false
        }
    }

    #[rstest]
    fn boundary_policy_is_replaceable() {
        let mut acc = SegmentAccumulator::with_boundary(NeverSame);
        acc.on_start(10, 0.0);
        acc.on_stop(10, 4.0);
        acc.on_start(10, 10.0);
        acc.on_stop(10, 13.0);

        // Every segment is its own repetition under this policy.
        assert_eq!(acc.intervals(), &[4.0, 3.0]);
    }
}
