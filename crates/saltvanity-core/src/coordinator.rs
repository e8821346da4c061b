//! Search coordinator
//!
//! Owns the table of in-flight searches, starts one dispatcher thread per
//! search and moves each search to its persisted terminal state.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::pool::{PoolOutcome, WorkerPool};
use crate::request::{RawSearchRequest, SearchRequest};
use crate::scanner::{BatchScanner, CancelToken};
use crate::stats::SearchStats;
use crate::status::{SearchId, SearchStatus};
use crate::store::SaltStore;

/// Returned by [`SearchCoordinator::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub search_id: SearchId,
    pub num_workers: usize,
}

enum SearchSlot {
    Running {
        cancel: CancelToken,
        stats: Arc<SearchStats>,
    },
    /// Terminal, but the store rejected the write.
    Unpersisted(SearchStatus),
}

#[derive(Default)]
struct SearchTable {
    active: HashMap<SearchId, SearchSlot>,
    last_id: u64,
}

impl SearchTable {
    /// Creation-time milliseconds, bumped so ids never repeat.
    fn next_id(&mut self) -> SearchId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let id = now.max(self.last_id + 1);
        self.last_id = id;
        SearchId::new(id.to_string())
    }
}

struct Inner {
    store: SaltStore,
    config: SearchConfig,
    table: Mutex<SearchTable>,
    finished: Condvar,
}

/// Accepts search requests and answers status queries.
///
/// Cheap to clone; clones share the same table and store.
#[derive(Clone)]
pub struct SearchCoordinator {
    inner: Arc<Inner>,
}

impl SearchCoordinator {
    /// Open the store named by `config.store_dir`.
    pub fn open(config: SearchConfig) -> Result<Self, SearchError> {
        let store = SaltStore::open(&config.store_dir)?;
        Ok(Self::with_store(store, config))
    }

    pub fn with_store(store: SaltStore, config: SearchConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                table: Mutex::new(SearchTable::default()),
                finished: Condvar::new(),
            }),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &SaltStore {
        &self.inner.store
    }

    /// Start a search in the background.
    pub fn submit(&self, request: SearchRequest) -> Result<SubmitResponse, SearchError> {
        request.validate()?;
        // Pick up salts committed by other processes sharing the store.
        self.inner.store.reload_used()?;

        let used = self.inner.store.used();
        let scanner = BatchScanner::new(&request, used.clone(), self.inner.config.progress_interval());
        let pool = WorkerPool::new(Arc::new(scanner), used, &self.inner.config)?;
        let num_workers = pool.num_workers();

        let search_id = {
            let mut table = self.inner.table.lock();
            let id = table.next_id();
            table.active.insert(
                id.clone(),
                SearchSlot::Running {
                    cancel: pool.cancel_token(),
                    stats: pool.stats(),
                },
            );
            id
        };

        info!(
            search_id = %search_id,
            suffix = %request.target_suffix,
            deployer = %request.deployer_address,
            bytecode_hash = %request.bytecode_hash,
            start_salt = %request.start_salt,
            batch_size = request.batch_size,
            workers = num_workers,
            "Starting salt search"
        );

        let inner = self.inner.clone();
        let id = search_id.clone();
        let spawned = thread::Builder::new()
            .name(format!("salt-search-{}", search_id))
            .spawn(move || inner.run_search(id, request, pool));

        if let Err(e) = spawned {
            self.inner.table.lock().active.remove(&search_id);
            return Err(SearchError::Spawn(e));
        }

        Ok(SubmitResponse {
            search_id,
            num_workers,
        })
    }

    /// Validate a wire-format request and start it.
    pub fn submit_raw(&self, raw: RawSearchRequest) -> Result<SubmitResponse, SearchError> {
        self.submit(SearchRequest::try_from(raw)?)
    }

    /// Current status of a search.
    pub fn poll(&self, search_id: &SearchId) -> Result<SearchStatus, SearchError> {
        {
            let table = self.inner.table.lock();
            match table.active.get(search_id) {
                Some(SearchSlot::Running { .. }) => {
                    return Ok(SearchStatus::Searching {
                        search_id: search_id.clone(),
                    })
                }
                Some(SearchSlot::Unpersisted(status)) => return Ok(status.clone()),
                None => {}
            }
        }
        // Results are written before the entry leaves the table.
        self.load_stored(search_id)
    }

    /// Block until the search is terminal or `timeout` elapses, then report
    /// its status.
    pub fn wait(&self, search_id: &SearchId, timeout: Duration) -> Result<SearchStatus, SearchError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut table = self.inner.table.lock();
        loop {
            match table.active.get(search_id) {
                Some(SearchSlot::Running { .. }) => {}
                Some(SearchSlot::Unpersisted(status)) => return Ok(status.clone()),
                None => break,
            }
            match deadline {
                Some(deadline) => {
                    if self.inner.finished.wait_until(&mut table, deadline).timed_out() {
                        return Ok(SearchStatus::Searching {
                            search_id: search_id.clone(),
                        });
                    }
                }
                None => self.inner.finished.wait(&mut table),
            }
        }
        drop(table);
        self.load_stored(search_id)
    }

    /// Live counters of a running search.
    pub fn stats(&self, search_id: &SearchId) -> Option<Arc<SearchStats>> {
        match self.inner.table.lock().active.get(search_id) {
            Some(SearchSlot::Running { stats, .. }) => Some(stats.clone()),
            _ => None,
        }
    }

    /// Ask a running search to stop. It ends as an error once its workers
    /// notice. Returns false if the search is not running.
    pub fn cancel(&self, search_id: &SearchId) -> bool {
        match self.inner.table.lock().active.get(search_id) {
            Some(SearchSlot::Running { cancel, .. }) => {
                info!(search_id = %search_id, "Cancelling search");
                cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Ids of searches still running, oldest first.
    pub fn active_searches(&self) -> Vec<SearchId> {
        let table = self.inner.table.lock();
        let mut ids: Vec<SearchId> = table
            .active
            .iter()
            .filter(|(_, slot)| matches!(slot, SearchSlot::Running { .. }))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_by_key(|id| id.as_str().parse::<u64>().unwrap_or(u64::MAX));
        ids
    }

    fn load_stored(&self, search_id: &SearchId) -> Result<SearchStatus, SearchError> {
        self.inner
            .store
            .load_result(search_id)?
            .ok_or_else(|| SearchError::NotFound(search_id.clone()))
    }
}

impl Inner {
    fn run_search(&self, search_id: SearchId, request: SearchRequest, pool: WorkerPool) {
        let outcome = pool.run(request.start_salt, request.batch_size);
        let stats = pool.stats();
        drop(pool);

        info!(
            search_id = %search_id,
            salts_checked = stats.total_salts(),
            elapsed_ms = stats.elapsed().as_millis() as u64,
            "Search finished"
        );

        let status = match outcome {
            PoolOutcome::Found { salt_match, .. } => SearchStatus::found(
                search_id,
                salt_match.salt,
                salt_match.address,
                request.deployer_address,
                request.bytecode_hash,
            ),
            PoolOutcome::Exhausted { range } => SearchStatus::no_match(search_id, range),
            PoolOutcome::Errored { message, range } => SearchStatus::Error {
                search_id,
                message,
                searched_range: Some(range),
            },
            PoolOutcome::TimedOut { range } => SearchStatus::Timeout {
                search_id,
                message: format!(
                    "Search timed out after {:.1} seconds",
                    self.config.timeout().as_secs_f64()
                ),
                searched_range: Some(range),
            },
        };

        self.finalize(status);
    }

    /// Commit a terminal status. Runs under the table lock so `poll` sees
    /// either the running entry or the stored result, never neither.
    fn finalize(&self, status: SearchStatus) {
        let search_id = status.search_id().clone();
        let mut table = self.table.lock();

        match self.persist(&status) {
            Ok(()) => {
                table.active.remove(&search_id);
                info!(search_id = %search_id, "Search result saved");
            }
            Err(e) => {
                let message = match status.found_salt() {
                    Some((salt, address)) => {
                        error!(
                            search_id = %search_id,
                            salt = %salt,
                            address = %address,
                            error = %e,
                            "Failed to persist found salt"
                        );
                        format!(
                            "Found salt {} (address {}) but failed to save the result: {}",
                            salt, address, e
                        )
                    }
                    None => {
                        error!(search_id = %search_id, error = %e, "Failed to persist search result");
                        format!("Failed to save the search result: {}", e)
                    }
                };
                let searched_range = match &status {
                    SearchStatus::Completed { searched_range, .. }
                    | SearchStatus::Error { searched_range, .. }
                    | SearchStatus::Timeout { searched_range, .. } => *searched_range,
                    SearchStatus::Searching { .. } => None,
                };
                table.active.insert(
                    search_id.clone(),
                    SearchSlot::Unpersisted(SearchStatus::Error {
                        search_id,
                        message,
                        searched_range,
                    }),
                );
            }
        }

        drop(table);
        self.finished.notify_all();
    }

    /// Used-set first, so a stored success always implies a durable salt.
    fn persist(&self, status: &SearchStatus) -> Result<(), SearchError> {
        if let Some((salt, _)) = status.found_salt() {
            self.store.mark_used(salt)?;
        }
        self.store.save_result(status)
    }
}
