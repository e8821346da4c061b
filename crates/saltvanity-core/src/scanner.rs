//! Batch scanner: walks one contiguous salt range looking for a suffix match.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use saltvanity_crypto::{Address, Create2Preimage, B256, U256};
use saltvanity_pattern::SuffixPattern;
use serde::{Deserialize, Serialize};

use crate::request::SearchRequest;
use crate::store::UsedSalts;

/// Candidates between clock / cancellation checks.
const CLOCK_CHECK_INTERVAL: u32 = 4096;

/// Half-open salt range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaltRange {
    pub start: U256,
    pub end: U256,
}

impl SaltRange {
    pub fn new(start: U256, end: U256) -> Self {
        Self { start, end }
    }

    /// Range of `len` salts from `start`, clamped at `U256::MAX`.
    pub fn with_len(start: U256, len: u64) -> Self {
        Self {
            start,
            end: start.saturating_add(U256::from(len)),
        }
    }

    pub fn contains(&self, salt: &U256) -> bool {
        self.start <= *salt && *salt < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn overlaps(&self, other: &SaltRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Cooperative cancellation flag shared by every worker of one search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Periodic throughput report from a running scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Salts checked since the previous report
    pub checked: u64,
    /// Salts per second over that window
    pub rate: f64,
}

impl Progress {
    pub fn new(checked: u64, window: Duration) -> Self {
        let secs = window.as_secs_f64();
        let rate = if secs > 0.0 { checked as f64 / secs } else { 0.0 };
        Self { checked, rate }
    }
}

/// A salt whose derived address ends with the target suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaltMatch {
    pub salt: U256,
    pub address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// First match in the range; nothing after it was examined.
    Found(SaltMatch),
    /// The whole range was scanned without a match.
    Completed,
    /// The cancel token fired before the range was exhausted.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub outcome: ScanOutcome,
    /// Total salts examined by this scan
    pub checked: u64,
}

/// Something that can scan one batch. The pool only talks to this trait.
pub trait Scanner: Send + Sync {
    fn scan(
        &self,
        range: &SaltRange,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(Progress),
    ) -> ScanReport;
}

/// CPU scanner deriving CREATE2 addresses for consecutive salts.
#[derive(Debug, Clone)]
pub struct BatchScanner {
    deployer: Address,
    bytecode_hash: B256,
    suffix: SuffixPattern,
    used: Arc<UsedSalts>,
    progress_interval: Duration,
}

impl BatchScanner {
    pub fn new(request: &SearchRequest, used: Arc<UsedSalts>, progress_interval: Duration) -> Self {
        Self {
            deployer: request.deployer_address,
            bytecode_hash: request.bytecode_hash,
            suffix: request.target_suffix.clone(),
            used,
            progress_interval,
        }
    }
}

impl Scanner for BatchScanner {
    fn scan(
        &self,
        range: &SaltRange,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(Progress),
    ) -> ScanReport {
        let mut preimage = Create2Preimage::new(&self.deployer, &self.bytecode_hash);
        let mut salt = range.start;
        let mut checked = 0u64;
        let mut since_report = 0u64;
        let mut last_report = Instant::now();
        let mut until_tick = 0u32;

        while salt < range.end {
            if until_tick == 0 {
                until_tick = CLOCK_CHECK_INTERVAL;
                if cancel.is_cancelled() {
                    return ScanReport {
                        outcome: ScanOutcome::Cancelled,
                        checked,
                    };
                }
                let window = last_report.elapsed();
                if since_report > 0 && window >= self.progress_interval {
                    on_progress(Progress::new(since_report, window));
                    since_report = 0;
                    last_report = Instant::now();
                }
            }
            until_tick -= 1;

            let address = preimage.address_for(&salt);
            checked += 1;
            since_report += 1;

            // Used set is only checked on a suffix hit.
            if self.suffix.matches_bytes(address.as_slice()) && !self.used.contains(&salt) {
                return ScanReport {
                    outcome: ScanOutcome::Found(SaltMatch { salt, address }),
                    checked,
                };
            }

            salt += U256::from(1u8);
        }

        ScanReport {
            outcome: ScanOutcome::Completed,
            checked,
        }
    }
}
