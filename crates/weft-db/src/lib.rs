//! # Weft DB
//!
//! The local record store: an append-only record log, a SQLite selector
//! index, and the graph weight-reconciliation engine that makes replicas
//! converge to identical weights regardless of ingest order.
//!
//! ## Layout
//!
//! A store directory holds two files:
//!
//! - `log` - records back to back, addressed by `(offset, length)`
//! - `index` - id to position, selector keys, and a weight snapshot
//!
//! ## Key Types
//!
//! - [`Db`] - open/ingest/query facade
//! - [`Graph`] - the weight engine (exposed for inspection and tests)
//! - [`PutOutcome`] / [`QueryResult`] - ingest and query surfaces

pub mod db;
pub mod error;
pub mod graph;
pub mod index;
pub mod iset;
pub mod log;

pub use db::{Db, DbConfig, PutOutcome, QueryResult, RecordHook};
pub use error::{DbError, Result};
pub use graph::{Graph, InsertNode, InsertOutcome, NodeStatus};
pub use iset::ISet;
