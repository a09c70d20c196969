//! Correlation core for trace metric extraction.
//!
//! A trace source delivers a single, time-ordered pass over heterogeneous
//! events; observers hold all correlation state as instance fields and
//! match starts to stops by correlation key. Everything here is
//! single-threaded and scoped to one parse invocation: construct a fresh
//! observer per capture, never reuse one across files.

use thiserror::Error;

pub mod accumulate;
pub mod filter;
pub mod interval;
pub mod marker;
pub mod session;
pub mod source;
pub mod threadtime;

pub use accumulate::{ConsecutivePid, RepetitionBoundary, SegmentAccumulator};
pub use filter::ProcessFilter;
pub use interval::{CorrelationKey, IntervalTracker};
pub use marker::MarkerMatcher;
pub use session::{KernelKeyword, SessionPlan};
pub use source::{CaptureFile, EventObserver, EventSource, Platform, ProviderBinding, VecSource};
pub use threadtime::ThreadTimeTracker;

#[derive(Error, Debug)]
pub enum CorrelatorError {
    #[error("capture error: {0}")]
    Capture(#[from] trace_model::CaptureError),

    #[error("{keyword:?} tracing is not available on {platform:?}")]
    UnsupportedCapability {
        keyword: session::KernelKeyword,
        platform: source::Platform,
    },
}

pub type Result<T> = std::result::Result<T, CorrelatorError>;
