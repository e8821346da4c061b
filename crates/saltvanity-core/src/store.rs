//! Durable used-salt set and terminal result store.
//!
//! Layout under the store root:
//!
//!   used-salts.json          JSON array of decimal salt strings
//!   results/<search-id>.json one terminal `SearchStatus` per search
//!
//! Every write goes to a uniquely named temp file that is fsync'd and renamed
//! over the target, and all writes from one handle are serialized through one
//! mutex. Handles in other processes may share the directory.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tempfile::NamedTempFile;
use saltvanity_crypto::U256;
use tracing::{debug, info};

use crate::error::SearchError;
use crate::status::{SearchId, SearchStatus};

const USED_SALTS_FILE: &str = "used-salts.json";
const RESULTS_DIR: &str = "results";

/// In-memory view of consumed salts, shared with the scanners.
#[derive(Debug, Default)]
pub struct UsedSalts {
    set: RwLock<HashSet<U256>>,
}

impl UsedSalts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, salt: &U256) -> bool {
        self.set.read().contains(salt)
    }

    /// Reserve `salt`. Returns false if it was already taken.
    pub fn claim(&self, salt: U256) -> bool {
        self.set.write().insert(salt)
    }

    pub fn len(&self) -> usize {
        self.set.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.read().is_empty()
    }

    /// Sorted copy of the set.
    pub fn snapshot(&self) -> Vec<U256> {
        let mut salts: Vec<U256> = self.set.read().iter().copied().collect();
        salts.sort();
        salts
    }

    fn extend(&self, salts: impl IntoIterator<Item = U256>) {
        self.set.write().extend(salts);
    }
}

impl FromIterator<U256> for UsedSalts {
    fn from_iter<I: IntoIterator<Item = U256>>(iter: I) -> Self {
        Self {
            set: RwLock::new(iter.into_iter().collect()),
        }
    }
}

/// File-backed store for used salts and terminal search results.
#[derive(Debug)]
pub struct SaltStore {
    root: PathBuf,
    used: Arc<UsedSalts>,
    write_lock: Mutex<()>,
}

impl SaltStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SearchError> {
        let root = root.into();
        let results = root.join(RESULTS_DIR);
        fs::create_dir_all(&results).map_err(|e| SearchError::persistence(&results, e))?;

        let store = Self {
            root,
            used: Arc::new(UsedSalts::new()),
            write_lock: Mutex::new(()),
        };
        let loaded = store.reload_used()?;
        info!(path = %store.root.display(), used_salts = loaded, "Opened salt store");
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shared handle to the in-memory used-salt set.
    pub fn used(&self) -> Arc<UsedSalts> {
        self.used.clone()
    }

    pub fn contains(&self, salt: &U256) -> bool {
        self.used.contains(salt)
    }

    /// Merge the on-disk used-salt set into memory. Returns the set size.
    pub fn reload_used(&self) -> Result<usize, SearchError> {
        let salts = self.read_used_file()?;
        self.used.extend(salts);
        Ok(self.used.len())
    }

    /// Record `salt` as consumed and flush the whole set to disk.
    ///
    /// The file is re-read under the write lock first, so salts written by
    /// other handles on the same directory are kept. The flush happens even
    /// if the salt was already claimed in memory, so a successful return
    /// always means the salt is durable.
    pub fn mark_used(&self, salt: U256) -> Result<(), SearchError> {
        let _guard = self.write_lock.lock();
        let on_disk = self.read_used_file()?;
        self.used.extend(on_disk);
        self.used.claim(salt);

        let entries: Vec<String> = self.used.snapshot().iter().map(|s| s.to_string()).collect();
        let path = self.used_salts_path();
        let bytes = serde_json::to_vec(&entries).map_err(|e| SearchError::serialization(&path, e))?;
        write_atomic(&path, &bytes).map_err(|e| SearchError::persistence(&path, e))?;

        debug!(salt = %salt, total = entries.len(), "Marked salt as used");
        Ok(())
    }

    /// Persist a terminal result under its search id.
    pub fn save_result(&self, status: &SearchStatus) -> Result<(), SearchError> {
        let path = self.result_path(status.search_id())?;
        let bytes =
            serde_json::to_vec_pretty(status).map_err(|e| SearchError::serialization(&path, e))?;

        let _guard = self.write_lock.lock();
        write_atomic(&path, &bytes).map_err(|e| SearchError::persistence(&path, e))
    }

    /// Load a terminal result. `Ok(None)` if no record exists.
    pub fn load_result(&self, search_id: &SearchId) -> Result<Option<SearchStatus>, SearchError> {
        if !search_id.is_well_formed() {
            return Ok(None);
        }
        let path = self.result_path(search_id)?;
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SearchError::persistence(&path, e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| SearchError::serialization(&path, e))
    }

    fn read_used_file(&self) -> Result<Vec<U256>, SearchError> {
        let path = self.used_salts_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SearchError::persistence(&path, e)),
        };

        let entries: Vec<String> =
            serde_json::from_str(&raw).map_err(|e| SearchError::serialization(&path, e))?;
        entries
            .iter()
            .map(|s| {
                U256::from_str(s).map_err(|e| {
                    SearchError::persistence(
                        &path,
                        io::Error::new(io::ErrorKind::InvalidData, format!("bad salt {:?}: {}", s, e)),
                    )
                })
            })
            .collect()
    }

    fn used_salts_path(&self) -> PathBuf {
        self.root.join(USED_SALTS_FILE)
    }

    fn result_path(&self, search_id: &SearchId) -> Result<PathBuf, SearchError> {
        if !search_id.is_well_formed() {
            return Err(SearchError::InvalidRequest(format!(
                "malformed search id {:?}",
                search_id.as_str()
            )));
        }
        Ok(self
            .root
            .join(RESULTS_DIR)
            .join(format!("{}.json", search_id)))
    }
}

/// Write through a uniquely named temp file in the target directory, then
/// rename it into place and sync the directory entry.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    sync_dir(dir)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
