//! Live counters of an acquisition run.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::download::FailureReason;

/// Counters shared by the crawl loop, the workers and the progress display.
#[derive(Debug, Default)]
pub struct AcquisitionStats {
    targeted: AtomicUsize,
    candidates: AtomicUsize,
    pages_visited: AtomicUsize,
    resolved: AtomicUsize,
    acquired: AtomicUsize,
    reused: AtomicUsize,
    failed: AtomicUsize,
    resolution_misses: AtomicUsize,
    robots_skipped: AtomicUsize,
    failures: Mutex<BTreeMap<FailureReason, usize>>,
}

/// Point-in-time copy of [`AcquisitionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Requested asset count.
    pub targeted: usize,
    /// References yielded by the crawler.
    pub candidates: usize,
    /// Listing pages fetched.
    pub pages_visited: usize,
    /// References resolved to a direct URL.
    pub resolved: usize,
    /// Assets stored (downloaded or reused).
    pub acquired: usize,
    /// Subset of `acquired` that needed no request.
    pub reused: usize,
    /// Downloads that failed.
    pub failed: usize,
    /// References that did not resolve.
    pub resolution_misses: usize,
    /// Asset URLs refused by robots.txt.
    pub robots_skipped: usize,
}

impl StatsSnapshot {
    /// References fully handled so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.acquired + self.failed + self.resolution_misses + self.robots_skipped
    }
}

impl AcquisitionStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        for counter in [
            &self.targeted,
            &self.candidates,
            &self.pages_visited,
            &self.resolved,
            &self.acquired,
            &self.reused,
            &self.failed,
            &self.resolution_misses,
            &self.robots_skipped,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Returns the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            targeted: self.targeted.load(Ordering::SeqCst),
            candidates: self.candidates.load(Ordering::SeqCst),
            pages_visited: self.pages_visited.load(Ordering::SeqCst),
            resolved: self.resolved.load(Ordering::SeqCst),
            acquired: self.acquired.load(Ordering::SeqCst),
            reused: self.reused.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            resolution_misses: self.resolution_misses.load(Ordering::SeqCst),
            robots_skipped: self.robots_skipped.load(Ordering::SeqCst),
        }
    }

    /// Download failures grouped by reason.
    #[must_use]
    pub fn failure_breakdown(&self) -> BTreeMap<FailureReason, usize> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_targeted(&self, count: usize) {
        self.targeted.store(count, Ordering::SeqCst);
    }

    pub(crate) fn add_candidates(&self, count: usize, pages: usize) {
        self.candidates.fetch_add(count, Ordering::SeqCst);
        self.pages_visited.fetch_add(pages, Ordering::SeqCst);
    }

    pub(crate) fn record_resolved(&self) {
        self.resolved.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_miss(&self) {
        self.resolution_misses.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_robots_skip(&self) {
        self.robots_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_acquired(&self, reused: bool) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        if reused {
            self.reused.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn record_failure(&self, reason: FailureReason) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        *self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(reason)
            .or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_records() {
        let stats = AcquisitionStats::new();
        stats.set_targeted(50);
        stats.add_candidates(12, 2);
        stats.record_resolved();
        stats.record_resolved();
        stats.record_acquired(false);
        stats.record_acquired(true);
        stats.record_miss();
        stats.record_failure(FailureReason::TooSmall);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.targeted, 50);
        assert_eq!(snapshot.candidates, 12);
        assert_eq!(snapshot.pages_visited, 2);
        assert_eq!(snapshot.acquired, 2);
        assert_eq!(snapshot.reused, 1);
        assert_eq!(snapshot.processed(), 4);
    }

    #[test]
    fn test_failure_breakdown_groups_by_reason() {
        let stats = AcquisitionStats::new();
        stats.record_failure(FailureReason::Timeout);
        stats.record_failure(FailureReason::ExhaustedRetries);
        stats.record_failure(FailureReason::Timeout);

        let breakdown = stats.failure_breakdown();
        assert_eq!(breakdown.get(&FailureReason::Timeout), Some(&2));
        assert_eq!(breakdown.get(&FailureReason::ExhaustedRetries), Some(&1));
        assert_eq!(stats.snapshot().failed, 3);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let stats = AcquisitionStats::new();
        stats.record_acquired(true);
        stats.record_failure(FailureReason::HttpError);
        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
        assert!(stats.failure_breakdown().is_empty());
    }
}
