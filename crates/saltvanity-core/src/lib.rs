//! SaltVanity Core Engine
//!
//! Multi-threaded CREATE2 salt search: batch scanning, worker dispatch,
//! search coordination and the durable used-salt / result store.

mod config;
mod coordinator;
mod error;
mod pool;
mod request;
mod scanner;
mod stats;
mod status;
mod store;

pub use config::SearchConfig;
pub use coordinator::{SearchCoordinator, SubmitResponse};
pub use error::SearchError;
pub use pool::{Dispatcher, PoolOutcome, WorkerPool};
pub use request::{RawSearchRequest, SaltInput, SearchRequest, DEFAULT_BATCH_SIZE};
pub use scanner::{BatchScanner, CancelToken, Progress, SaltMatch, SaltRange, ScanOutcome, ScanReport, Scanner};
pub use stats::SearchStats;
pub use status::{SearchId, SearchStatus, SearchedRange};
pub use store::{SaltStore, UsedSalts};

// Re-exports for convenience
pub use saltvanity_crypto::{
    create2_address, eip55_checksum, init_code_hash, parse_address, parse_b256, parse_hex, Address, B256, U256,
};
pub use saltvanity_pattern::{calculate_difficulty, format_difficulty, format_duration, SuffixPattern};
