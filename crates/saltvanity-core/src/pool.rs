//! Worker pool and batch dispatcher.
//!
//! One dispatcher loop owns the salt cursor and hands out fixed-size batches;
//! workers run on a dedicated rayon pool and report back over a channel. All
//! cursor movement and reassignment happens on the dispatcher thread.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use saltvanity_crypto::U256;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::scanner::{CancelToken, Progress, SaltMatch, SaltRange, ScanOutcome, ScanReport, Scanner};
use crate::stats::SearchStats;
use crate::status::SearchedRange;
use crate::store::UsedSalts;

/// How a pool run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolOutcome {
    Found {
        salt_match: SaltMatch,
        range: SearchedRange,
    },
    Exhausted {
        range: SearchedRange,
    },
    Errored {
        message: String,
        range: SearchedRange,
    },
    TimedOut {
        range: SearchedRange,
    },
}

impl PoolOutcome {
    /// Salts dispatched before the pool stopped.
    pub fn range(&self) -> &SearchedRange {
        match self {
            PoolOutcome::Found { range, .. }
            | PoolOutcome::Exhausted { range }
            | PoolOutcome::Errored { range, .. }
            | PoolOutcome::TimedOut { range } => range,
        }
    }
}

/// Batch cursor over the salt space.
///
/// Ranges are carved off the cursor in order and the cursor never moves
/// backwards, so every range handed out is disjoint from every other.
#[derive(Debug)]
pub struct Dispatcher {
    origin: U256,
    cursor: U256,
    batch_size: u64,
    /// 0 = unlimited
    max_batches: u64,
    dispatched: u64,
    active: HashMap<usize, SaltRange>,
}

impl Dispatcher {
    pub fn new(start: U256, batch_size: u64, max_batches: u64) -> Self {
        Self {
            origin: start,
            cursor: start,
            batch_size,
            max_batches,
            dispatched: 0,
            active: HashMap::new(),
        }
    }

    /// Next batch for `worker`, or `None` once the cap or the end of the
    /// salt space is reached.
    ///
    /// Ranges are half-open with `U256::MAX` as the largest end, so salt
    /// `2^256 - 1` itself is never dispatched.
    pub fn assign(&mut self, worker: usize) -> Option<SaltRange> {
        if self.max_batches > 0 && self.dispatched >= self.max_batches {
            return None;
        }
        let range = SaltRange::with_len(self.cursor, self.batch_size);
        if range.is_empty() {
            return None;
        }
        self.cursor = range.end;
        self.dispatched += 1;
        self.active.insert(worker, range);
        Some(range)
    }

    /// Hand `worker` back the unscanned tail of a batch it already held.
    ///
    /// Only salts behind the cursor are accepted, and the batch count is not
    /// bumped. `None` if the tail is empty.
    pub fn resume(&mut self, worker: usize, rest: SaltRange) -> Option<SaltRange> {
        if rest.is_empty() || rest.start < self.origin || rest.end > self.cursor {
            return None;
        }
        self.active.insert(worker, rest);
        Some(rest)
    }

    /// Worker is done with its batch, however it ended.
    pub fn release(&mut self, worker: usize) -> Option<SaltRange> {
        self.active.remove(&worker)
    }

    pub fn active(&self) -> impl Iterator<Item = (usize, SaltRange)> + '_ {
        self.active.iter().map(|(w, r)| (*w, *r))
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Everything handed out so far.
    pub fn searched(&self) -> SearchedRange {
        SearchedRange {
            start_salt: self.origin,
            end_salt: self.cursor,
        }
    }
}

enum WorkerEvent {
    Progress { worker: usize, progress: Progress },
    Finished { worker: usize, report: ScanReport },
    Failed { worker: usize, message: String },
}

/// Fixed-size pool of scan workers for one search.
pub struct WorkerPool {
    scanner: Arc<dyn Scanner>,
    threads: rayon::ThreadPool,
    num_workers: usize,
    max_batches: u64,
    timeout: Duration,
    max_consecutive_failures: u32,
    used: Arc<UsedSalts>,
    stats: Arc<SearchStats>,
    cancel: CancelToken,
}

impl WorkerPool {
    pub fn new(
        scanner: Arc<dyn Scanner>,
        used: Arc<UsedSalts>,
        config: &SearchConfig,
    ) -> Result<Self, SearchError> {
        let num_workers = config.worker_count();
        let threads = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("salt-worker-{}", i))
            .build()?;

        Ok(Self {
            scanner,
            threads,
            num_workers,
            max_batches: config.max_batches,
            timeout: config.timeout(),
            max_consecutive_failures: config.max_consecutive_failures.max(1),
            used,
            stats: SearchStats::new(),
            cancel: CancelToken::new(),
        })
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn stats(&self) -> Arc<SearchStats> {
        self.stats.clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the search to a terminal outcome (blocking).
    pub fn run(&self, start_salt: U256, batch_size: u64) -> PoolOutcome {
        let deadline = Instant::now().checked_add(self.timeout);
        let (tx, rx) = unbounded();
        let mut dispatcher = Dispatcher::new(start_salt, batch_size, self.max_batches);
        let mut reported: HashMap<usize, u64> = HashMap::new();
        let mut consecutive_failures = 0u32;
        let mut completed_batches = 0u64;
        let mut last_error: Option<String> = None;

        info!(
            workers = self.num_workers,
            batch_size,
            start_salt = %start_salt,
            "Starting worker pool"
        );

        for worker in 0..self.num_workers {
            self.dispatch(&mut dispatcher, worker, &tx);
        }

        loop {
            if dispatcher.active_count() == 0 {
                self.stats.stop();
                let range = dispatcher.searched();
                if self.cancel.is_cancelled() {
                    return PoolOutcome::Errored {
                        message: "Search cancelled".to_string(),
                        range,
                    };
                }
                return match last_error {
                    Some(message) if completed_batches == 0 => {
                        warn!(batches = dispatcher.dispatched(), "Every batch failed");
                        PoolOutcome::Errored {
                            message: format!("Search failed: {}", message),
                            range,
                        }
                    }
                    _ => {
                        info!(
                            start_salt = %range.start_salt,
                            end_salt = %range.end_salt,
                            "All workers have completed their search"
                        );
                        PoolOutcome::Exhausted { range }
                    }
                };
            }

            let received = match deadline {
                Some(deadline) => rx.recv_deadline(deadline),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            let event = match received {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => {
                    self.cancel.cancel();
                    self.stats.stop();
                    let range = dispatcher.searched();
                    warn!(
                        timeout_ms = self.timeout.as_millis() as u64,
                        active = dispatcher.active_count(),
                        "Search timed out, cancelling workers"
                    );
                    return PoolOutcome::TimedOut { range };
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.cancel.cancel();
                    self.stats.stop();
                    return PoolOutcome::Errored {
                        message: "Worker channel closed".to_string(),
                        range: dispatcher.searched(),
                    };
                }
            };

            match event {
                WorkerEvent::Progress { worker, progress } => {
                    self.stats.add_salts(progress.checked);
                    *reported.entry(worker).or_default() += progress.checked;
                    debug!(worker, checked = progress.checked, rate = progress.rate as u64, "Worker progress");
                }
                WorkerEvent::Finished { worker, report } => {
                    let already = reported.remove(&worker).unwrap_or(0);
                    self.stats.add_salts(report.checked.saturating_sub(already));
                    let range = dispatcher.release(worker);

                    match report.outcome {
                        ScanOutcome::Found(salt_match) => {
                            if self.used.claim(salt_match.salt) {
                                self.cancel.cancel();
                                self.stats.mark_found();
                                info!(
                                    worker,
                                    salt = %salt_match.salt,
                                    address = %salt_match.address,
                                    "Worker found a matching salt"
                                );
                                return PoolOutcome::Found {
                                    salt_match,
                                    range: dispatcher.searched(),
                                };
                            }
                            // Another search committed this salt after our
                            // scan checked it. Keep scanning past it.
                            warn!(worker, salt = %salt_match.salt, "Matching salt already used, resuming batch");
                            consecutive_failures = 0;
                            let rest = range.and_then(|batch| {
                                let rest = SaltRange::new(salt_match.salt + U256::from(1u8), batch.end);
                                dispatcher.resume(worker, rest)
                            });
                            match rest {
                                Some(rest) => {
                                    self.start(worker, rest, &tx);
                                    continue;
                                }
                                None => completed_batches += 1,
                            }
                        }
                        ScanOutcome::Completed => {
                            consecutive_failures = 0;
                            completed_batches += 1;
                            if let Some(range) = range {
                                debug!(worker, start = %range.start, end = %range.end, "Worker completed range");
                            }
                        }
                        ScanOutcome::Cancelled => {}
                    }

                    self.dispatch(&mut dispatcher, worker, &tx);
                }
                WorkerEvent::Failed { worker, message } => {
                    reported.remove(&worker);
                    let range = dispatcher.release(worker);
                    consecutive_failures += 1;
                    warn!(
                        worker,
                        start = ?range.map(|r| r.start),
                        error = %message,
                        consecutive_failures,
                        "Worker failed, discarding batch"
                    );

                    if consecutive_failures >= self.max_consecutive_failures {
                        self.cancel.cancel();
                        self.stats.stop();
                        return PoolOutcome::Errored {
                            message: format!(
                                "Search failed after {} consecutive worker failures: {}",
                                consecutive_failures, message
                            ),
                            range: dispatcher.searched(),
                        };
                    }
                    last_error = Some(message);
                    self.dispatch(&mut dispatcher, worker, &tx);
                }
            }
        }
    }

    /// Assign `worker` its next batch and start scanning it.
    fn dispatch(&self, dispatcher: &mut Dispatcher, worker: usize, tx: &Sender<WorkerEvent>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let Some(range) = dispatcher.assign(worker) else {
            debug!(worker, "No more work available, worker idle");
            return false;
        };
        self.start(worker, range, tx);
        true
    }

    /// Scan `range` on the pool and report back on `tx`.
    fn start(&self, worker: usize, range: SaltRange, tx: &Sender<WorkerEvent>) {
        info!(worker, start = %range.start, end = %range.end, "Worker searching salts");

        let scanner = self.scanner.clone();
        let cancel = self.cancel.clone();
        let tx = tx.clone();
        self.threads.spawn(move || {
            let progress_tx = tx.clone();
            let mut on_progress = move |progress: Progress| {
                let _ = progress_tx.send(WorkerEvent::Progress { worker, progress });
            };
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                scanner.scan(&range, &cancel, &mut on_progress)
            }));
            let event = match result {
                Ok(report) => WorkerEvent::Finished { worker, report },
                Err(payload) => WorkerEvent::Failed {
                    worker,
                    message: panic_message(payload.as_ref()),
                },
            };
            let _ = tx.send(event);
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
