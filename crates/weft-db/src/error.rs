//! Error types for the weft store.

use thiserror::Error;
use weft_core::RecordError;

/// Errors from the local record store.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("stored record at offset {offset} is corrupt")]
    CorruptStored { offset: u64 },

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("store is shut down")]
    ShutDown,

    #[error("genesis parameters: {0}")]
    Genesis(#[from] weft_core::GenesisError),
}

pub type Result<T> = std::result::Result<T, DbError>;
