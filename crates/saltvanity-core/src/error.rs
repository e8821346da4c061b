//! Error types for the search engine

use std::io;
use std::path::PathBuf;

use saltvanity_crypto::EncodingError;
use saltvanity_pattern::PatternError;
use thiserror::Error;

use crate::status::SearchId;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Search {0} not found")]
    NotFound(SearchId),

    #[error("Failed to access {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode or decode {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to create worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to spawn search thread: {0}")]
    Spawn(#[source] io::Error),
}

impl SearchError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.into(),
            source,
        }
    }
}

impl From<EncodingError> for SearchError {
    fn from(err: EncodingError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<PatternError> for SearchError {
    fn from(err: PatternError) -> Self {
        Self::InvalidRequest(format!("target suffix: {}", err))
    }
}
