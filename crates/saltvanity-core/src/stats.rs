//! Per-search counters shared between the dispatcher and status readers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use saltvanity_pattern::{estimate_time_50pct, format_duration};

/// Salts checked and run state for one search. Updated by the dispatcher
/// loop, read by anyone holding the `Arc`.
#[derive(Debug)]
pub struct SearchStats {
    salts_checked: AtomicU64,
    start_time: Instant,
    running: AtomicBool,
    found: AtomicBool,
}

impl SearchStats {
    /// Counters starting at zero, clock starting now.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add salts reported by a worker.
    pub fn add_salts(&self, count: u64) {
        self.salts_checked.fetch_add(count, Ordering::Relaxed);
    }

    pub fn total_salts(&self) -> u64 {
        self.salts_checked.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average derivation rate since the search started.
    pub fn salts_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_salts() as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// The pool has reached a terminal outcome.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// A salt was claimed; also stops.
    pub fn mark_found(&self) {
        self.found.store(true, Ordering::Relaxed);
        self.stop();
    }

    pub fn is_found(&self) -> bool {
        self.found.load(Ordering::Relaxed)
    }

    /// One-line status: rate, total, odds of a hit so far and the time left
    /// until those odds reach 50% for a search of `difficulty`.
    pub fn format(&self, difficulty: f64) -> String {
        let salts = self.total_salts();
        let sps = self.salts_per_second();

        // Probability of at least one hit so far
        let prob = if difficulty > 0.0 {
            1.0 - (-(salts as f64) / difficulty).exp()
        } else {
            0.0
        };

        let remaining_for_50 = if prob < 0.5 {
            estimate_time_50pct(difficulty, sps) - self.elapsed().as_secs_f64()
        } else {
            0.0
        };

        format!(
            "[{:.2} Msalt/s][Total {}][Prob {:.1}%][50% in {}]",
            sps / 1_000_000.0,
            format_count(salts),
            prob * 100.0,
            format_duration(remaining_for_50)
        )
    }
}

impl Default for SearchStats {
    fn default() -> Self {
        Self {
            salts_checked: AtomicU64::new(0),
            start_time: Instant::now(),
            running: AtomicBool::new(true),
            found: AtomicBool::new(false),
        }
    }
}

pub(crate) fn format_count(count: u64) -> String {
    if count >= 1_000_000_000_000 {
        format!("{:.2}T", count as f64 / 1e12)
    } else if count >= 1_000_000_000 {
        format!("{:.2}G", count as f64 / 1e9)
    } else if count >= 1_000_000 {
        format!("{:.2}M", count as f64 / 1e6)
    } else if count >= 1000 {
        format!("{:.2}K", count as f64 / 1e3)
    } else {
        format!("{}", count)
    }
}
