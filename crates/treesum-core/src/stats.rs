//! Per-walk statistics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Counters accumulated during a single walk.
///
/// All counters are monotonic within one walk and reset when a new walk
/// starts. `skipped + processed + erroneous` is the number of files visited
/// so far, and `processed_bytes` is the sum of the sizes of all emitted
/// records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStats {
    /// Files bypassed while resuming.
    pub skipped: u64,
    /// Files successfully digested.
    pub processed: u64,
    /// Files that failed to digest.
    pub erroneous: u64,
    /// Total size of successfully digested files.
    pub processed_bytes: u64,
}

impl WalkStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file bypassed by resume.
    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Record a successfully digested file.
    pub fn record_processed(&mut self, size: u64) {
        self.processed += 1;
        self.processed_bytes += size;
    }

    /// Record a file that failed to digest.
    pub fn record_error(&mut self) {
        self.erroneous += 1;
    }

    /// Total files visited so far.
    pub fn visited(&self) -> u64 {
        self.skipped + self.processed + self.erroneous
    }

    /// Processed bytes per second over `elapsed`.
    pub fn bytes_per_second(&self, elapsed: Duration) -> f64 {
        if elapsed.as_secs_f64() > 0.0 {
            self.processed_bytes as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_default() {
        let stats = WalkStats::default();
        assert_eq!(stats.visited(), 0);
        assert_eq!(stats.processed_bytes, 0);
    }

    #[test]
    fn test_stats_record() {
        let mut stats = WalkStats::new();
        stats.record_skipped();
        stats.record_processed(5);
        stats.record_processed(1019);
        stats.record_error();

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.erroneous, 1);
        assert_eq!(stats.processed_bytes, 1024);
        assert_eq!(stats.visited(), 4);
    }

    #[test]
    fn test_bytes_per_second() {
        let mut stats = WalkStats::new();
        stats.record_processed(2048);
        assert_eq!(stats.bytes_per_second(Duration::from_secs(2)), 1024.0);
        assert_eq!(stats.bytes_per_second(Duration::ZERO), 0.0);
    }
}
