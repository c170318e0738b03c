//! Counters describing what the engine has classified.
//!
//! The counters are observational only. Classification never reads them, so
//! live calls stay independent of one another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running totals for one process.
#[derive(Debug)]
pub struct AnalysisStats {
    /// Frames passed through the classifier
    frames_classified: AtomicU64,
    /// Frames with at least one issue
    frames_flagged: AtomicU64,
    /// Frames reported as `pose_undetected`
    frames_undetected: AtomicU64,
    /// Rule evaluations skipped on low confidence
    rules_skipped: AtomicU64,
    /// Batches that ran to completion or were cancelled
    batches_completed: AtomicU64,
    started_at: DateTime<Utc>,
}

impl AnalysisStats {
    pub fn new() -> Self {
        Self {
            frames_classified: AtomicU64::new(0),
            frames_flagged: AtomicU64::new(0),
            frames_undetected: AtomicU64::new(0),
            rules_skipped: AtomicU64::new(0),
            batches_completed: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    /// Record one classified frame.
    pub fn record_frame(&self, flagged: bool, undetected: bool, skipped_rules: usize) {
        self.frames_classified.fetch_add(1, Ordering::Relaxed);
        if flagged {
            self.frames_flagged.fetch_add(1, Ordering::Relaxed);
        }
        if undetected {
            self.frames_undetected.fetch_add(1, Ordering::Relaxed);
        }
        self.rules_skipped
            .fetch_add(skipped_rules as u64, Ordering::Relaxed);
    }

    pub fn record_batch(&self) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_classified: self.frames_classified.load(Ordering::Relaxed),
            frames_flagged: self.frames_flagged.load(Ordering::Relaxed),
            frames_undetected: self.frames_undetected.load(Ordering::Relaxed),
            rules_skipped: self.rules_skipped.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable summary for the CLI.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Analysis Statistics:\n\
             - Frames classified: {}\n\
             - Frames with issues: {}\n\
             - Frames without a pose: {}\n\
             - Rule checks skipped (low confidence): {}\n\
             - Batches completed: {}\n\
             - Elapsed: {} seconds",
            stats.frames_classified,
            stats.frames_flagged,
            stats.frames_undetected,
            stats.rules_skipped,
            stats.batches_completed,
            stats.uptime_secs
        )
    }

    pub fn reset(&self) {
        self.frames_classified.store(0, Ordering::Relaxed);
        self.frames_flagged.store(0, Ordering::Relaxed);
        self.frames_undetected.store(0, Ordering::Relaxed);
        self.rules_skipped.store(0, Ordering::Relaxed);
        self.batches_completed.store(0, Ordering::Relaxed);
    }
}

impl Default for AnalysisStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`AnalysisStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub frames_classified: u64,
    pub frames_flagged: u64,
    pub frames_undetected: u64,
    pub rules_skipped: u64,
    pub batches_completed: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Thread-safe shared statistics.
pub type SharedStats = Arc<AnalysisStats>;

pub fn create_shared_stats() -> SharedStats {
    Arc::new(AnalysisStats::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_counting() {
        let stats = AnalysisStats::new();
        stats.record_frame(true, true, 0);
        stats.record_frame(false, false, 2);
        stats.record_frame(true, false, 1);

        let snap = stats.snapshot();
        assert_eq!(snap.frames_classified, 3);
        assert_eq!(snap.frames_flagged, 2);
        assert_eq!(snap.frames_undetected, 1);
        assert_eq!(snap.rules_skipped, 3);
    }

    #[test]
    fn test_reset() {
        let stats = AnalysisStats::new();
        stats.record_frame(true, false, 4);
        stats.record_batch();
        stats.reset();

        let snap = stats.snapshot();
        assert_eq!(snap.frames_classified, 0);
        assert_eq!(snap.rules_skipped, 0);
        assert_eq!(snap.batches_completed, 0);
    }

    #[test]
    fn test_summary_format() {
        let summary = AnalysisStats::new().summary();
        assert!(summary.contains("Frames classified"));
        assert!(summary.contains("low confidence"));
    }
}
