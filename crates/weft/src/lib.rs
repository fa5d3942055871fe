//! # Weft
//!
//! A globally replicated, append-only key/value store whose state is a DAG
//! of signed records. This crate is the facade: it re-exports the core
//! primitives and the local store, and provides the [`Node`] seam an outer
//! transport plugs into.
//!
//! ```no_run
//! use weft::{GenesisParameters, Node, NodeConfig, OwnerType};
//!
//! let mut params = GenesisParameters::default();
//! params.name = "example".into();
//! params.record_min_links = 2;
//! let (genesis, _owner) = weft::create_genesis_records(OwnerType::Ed25519, &params).unwrap();
//! let mut blob = Vec::new();
//! for r in &genesis {
//!     blob.extend_from_slice(&r.to_bytes());
//! }
//!
//! let node = Node::open("/tmp/weft".as_ref(), NodeConfig::default(), Some(&blob), None).unwrap();
//! // feed records from the wire:
//! // node.ingest(&record_bytes)?;
//! node.stop();
//! ```

pub mod error;
pub mod node;

pub use error::NodeError;
pub use node::{Node, NodeConfig};

pub use weft_core::{
    create_genesis_records, make_selector_key, shandwich256, time_sec, CancelToken,
    GenesisParameters, Owner, OwnerPublic, OwnerType, Record, RecordBuilder, RecordId,
    RecordLimits, Selector, Wharrgarblr,
};
pub use weft_db::{Db, DbConfig, PutOutcome, QueryResult, RecordHook};
