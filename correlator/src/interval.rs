use std::collections::HashMap;

use tracing::debug;

/// Identity used to match a start event to its stop. A key has at most
/// one in-flight interval at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    Process(i32),
    Thread { pid: i32, tid: i32 },
    JoinGroup(i32),
}

/// Pending-interval map plus the result sequence it feeds.
///
/// Matching contract: `open` accepts a start only when no interval is
/// pending for the key (first-start-wins: a duplicate start for a
/// pending key is ignored, preserving observed parser behavior even
/// though it would miscount back-to-back repetitions that reuse a key
/// without an intervening stop). `close` accepts a stop only for a
/// pending key; unmatched stops are noise from truncated captures and
/// leave all other state untouched. Intervals still pending at end of
/// stream are dropped without emitting a partial result.
#[derive(Debug, Default)]
pub struct IntervalTracker {
    pending: HashMap<CorrelationKey, f64>,
    results: Vec<f64>,
}

impl IntervalTracker {
    pub fn new() -> Self {
        IntervalTracker::default()
    }

    /// Opens an interval for `key` at `timestamp_ms`. Returns false if
    /// an interval was already pending (the event is ignored).
    pub fn open(&mut self, key: CorrelationKey, timestamp_ms: f64) -> bool {
        if self.pending.contains_key(&key) {
            debug!(?key, timestamp_ms, "duplicate start ignored");
            return false;
        }
        self.pending.insert(key, timestamp_ms);
        true
    }

    /// Closes the pending interval for `key`, appending its duration to
    /// the result sequence. The key immediately becomes eligible for a
    /// new start. Returns `None` for an unmatched stop.
    pub fn close(&mut self, key: CorrelationKey, timestamp_ms: f64) -> Option<f64> {
        let start = self.pending.remove(&key)?;
        let duration = timestamp_ms - start;
        self.results.push(duration);
        Some(duration)
    }

    pub fn is_open(&self, key: &CorrelationKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn open_count(&self) -> usize {
        self.pending.len()
    }

    pub fn results(&self) -> &[f64] {
        &self.results
    }

    /// Drains the completed results, leaving pending intervals open.
    /// Used by parsers that partition results at marker events while an
    /// interval may still span the marker.
    pub fn take_results(&mut self) -> Vec<f64> {
        std::mem::take(&mut self.results)
    }

    pub fn into_results(self) -> Vec<f64> {
        self.results
    }
}
