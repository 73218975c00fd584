use std::path::PathBuf;
use thiserror::Error;

/// Rejected user input. Raised before any arithmetic happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("`{0}` is not a valid amount")]
    NotANumber(String),
    #[error("`{0}` is too large to be an amount")]
    OutOfRange(String),
    #[error("no card with key {0}")]
    UnknownCard(u64),
}

/// Failures of the on-disk card store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not find a data directory for the card file")]
    NoDataDir,
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("card file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode cards: {0}")]
    Encode(#[from] serde_json::Error),
}
