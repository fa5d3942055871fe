//! Error type for the node facade.

use thiserror::Error;

/// Errors surfaced by [`crate::Node`].
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Db(#[from] weft_db::DbError),

    #[error(transparent)]
    Record(#[from] weft_core::RecordError),

    #[error("node is stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, NodeError>;
