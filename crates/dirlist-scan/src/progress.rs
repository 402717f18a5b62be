//! Scan progress reporting.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Progress information during a scan.
///
/// The total is an estimate: it grows each time a subdirectory is pushed
/// onto the worklist, so the fraction may move backwards during a deep
/// recursive listing.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Number of directories fully processed.
    pub dirs_done: u64,
    /// Estimated number of directories to process.
    pub dirs_total: u64,
    /// Number of entries merged into the store.
    pub entries_found: u64,
    /// Directory currently being read.
    pub current_path: PathBuf,
    /// Number of directories or containers that could not be read.
    pub errors_count: u64,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            dirs_done: 0,
            dirs_total: 0,
            entries_found: 0,
            current_path: PathBuf::new(),
            errors_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Fraction of the estimated work done, in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        if self.dirs_total == 0 {
            return 0.0;
        }
        (self.dirs_done as f32 / self.dirs_total as f32).min(1.0)
    }

    /// Calculate scan rate in entries per second.
    pub fn entries_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.entries_found as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal progress tracker with timing.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    dirs_done: u64,
    dirs_total: u64,
    entries_found: u64,
    errors_count: u64,
    current_path: PathBuf,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            dirs_done: 0,
            dirs_total: 0,
            entries_found: 0,
            errors_count: 0,
            current_path: PathBuf::new(),
        }
    }

    pub fn add_pending_dir(&mut self) {
        self.dirs_total += 1;
    }

    pub fn record_dir(&mut self, entries: usize) {
        self.dirs_done += 1;
        self.entries_found += entries as u64;
    }

    pub fn record_error(&mut self) {
        self.errors_count += 1;
    }

    pub fn set_current_path(&mut self, path: PathBuf) {
        self.current_path = path;
    }

    pub fn snapshot(&self) -> ScanProgress {
        ScanProgress {
            dirs_done: self.dirs_done,
            dirs_total: self.dirs_total,
            entries_found: self.entries_found,
            current_path: self.current_path.clone(),
            errors_count: self.errors_count,
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_tracks_estimate() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.snapshot().fraction(), 0.0);

        tracker.add_pending_dir();
        tracker.add_pending_dir();
        tracker.record_dir(10);
        let progress = tracker.snapshot();
        assert_eq!(progress.fraction(), 0.5);
        assert_eq!(progress.entries_found, 10);

        // Discovering more work lowers the fraction.
        tracker.add_pending_dir();
        tracker.add_pending_dir();
        assert_eq!(tracker.snapshot().fraction(), 0.25);
    }
}
