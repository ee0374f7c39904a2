//! Dispatch metrics
//!
//! Each engine counts its dispatch calls and their outcomes so callers can
//! monitor how a long-lived engine behaves in production.
//!
//! ## Design
//!
//! - Lock-free atomic counters, updated with `Relaxed` ordering
//! - Counters only grow; a snapshot is a consistent-enough view for reporting
//! - Minimal overhead (one atomic add per outcome)

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::errors::DispatchError;

/// Outcome counters of one engine
#[derive(Debug, Default)]
pub struct EngineMetrics {
    dispatches: AtomicU64,
    succeeded: AtomicU64,
    malformed: AtomicU64,
    extraction_failures: AtomicU64,
    no_match: AtomicU64,
    handler_failures: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the start of a dispatch call
    pub fn record_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Records how a dispatch call ended
    pub fn record_outcome<R>(&self, outcome: &Result<R, DispatchError>) {
        let counter = match outcome {
            Ok(_) => &self.succeeded,
            Err(DispatchError::MalformedDataType(_)) => &self.malformed,
            Err(DispatchError::ExtractionFailure { .. }) => &self.extraction_failures,
            Err(DispatchError::NoMatchingHandler { .. }) => &self.no_match,
            Err(
                DispatchError::HandlerInvocation { .. }
                | DispatchError::ArgumentMismatch { .. }
                | DispatchError::Abandoned,
            ) => &self.handler_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatches: self.dispatches.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            no_match: self.no_match.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`EngineMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub dispatches: u64,
    pub succeeded: u64,
    pub malformed: u64,
    pub extraction_failures: u64,
    pub no_match: u64,
    pub handler_failures: u64,
}

impl MetricsSnapshot {
    /// Dispatch calls that ended in an error
    pub fn failed(&self) -> u64 {
        self.malformed + self.extraction_failures + self.no_match + self.handler_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DispatchKey;

    #[test]
    fn test_outcomes_are_counted_by_kind() {
        let metrics = EngineMetrics::new();

        metrics.record_dispatch();
        metrics.record_outcome(&Ok::<_, DispatchError>(1));

        metrics.record_dispatch();
        metrics.record_outcome::<()>(&Err(DispatchError::NoMatchingHandler {
            visit: "sum".to_string(),
            key: DispatchKey::new(Vec::new()),
        }));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.dispatches, 2);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.no_match, 1);
        assert_eq!(snapshot.failed(), 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(MetricsSnapshot::default()).expect("serializes");
        assert_eq!(json["dispatches"], 0);
    }
}
