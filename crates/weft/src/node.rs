//! The node seam: what an outer transport talks to.
//!
//! A [`Node`] owns the local store and exposes exactly the surface a
//! UDP/HTTP front end needs: `ingest` for record bytes arriving off the
//! wire, `query` for readers, and an append hook for gossiping freshly
//! stored records. The node wires no ingest policy of its own (a record
//! reaches the store if and only if a caller hands it to `ingest`) and it
//! never initiates I/O.
//!
//! Shutdown is cooperative: `stop()` flips the flag, drains the store's
//! worker pool, and flushes the weight snapshot. Ingest after stop fails
//! with [`NodeError::Stopped`].

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use weft_db::{Db, DbConfig, PutOutcome, QueryResult, RecordHook};

use crate::error::{NodeError, Result};

/// Configuration for a node.
#[derive(Clone, Debug, Default)]
pub struct NodeConfig {
    /// Store tuning.
    pub db: DbConfig,
}

/// A running weft node (minus the transport, which lives outside).
pub struct Node {
    db: Arc<Db>,
    stopped: AtomicBool,
}

impl Node {
    /// Open a node over the store in `dir`.
    ///
    /// `genesis` must be provided for a store that has never been
    /// initialized: the concatenated genesis records are ingested
    /// unconditionally and their embedded parameters become the network
    /// policy. `hook` fires on every successful append.
    pub fn open(
        dir: &Path,
        config: NodeConfig,
        genesis: Option<&[u8]>,
        hook: Option<RecordHook>,
    ) -> Result<Self> {
        let db = Db::open(dir, config.db, hook)?;
        if let Some(genesis_bytes) = genesis {
            db.initialize(genesis_bytes)?;
        }
        tracing::info!(dir = %dir.display(), "node open");
        Ok(Self {
            db: Arc::new(db),
            stopped: AtomicBool::new(false),
        })
    }

    /// The underlying store.
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Ingest record bytes received from a peer.
    ///
    /// Decodes, validates against the network parameters, appends, and
    /// schedules weight propagation. Duplicates are a no-op success.
    pub fn ingest(&self, record_bytes: &[u8]) -> Result<PutOutcome> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(NodeError::Stopped);
        }
        Ok(self.db.put_record_bytes(record_bytes)?)
    }

    /// Range query over selector keys; see [`Db::query`].
    pub fn query<F>(
        &self,
        ts_low: u64,
        ts_high: u64,
        ranges: &[([u8; 32], [u8; 32])],
        callback: F,
    ) -> Result<()>
    where
        F: FnMut(&QueryResult) -> bool,
    {
        Ok(self.db.query(ts_low, ts_high, ranges, callback)?)
    }

    /// True while the store has unpropagated or unresolved records.
    pub fn has_pending(&self) -> bool {
        self.db.has_pending()
    }

    /// Stop the node: no further ingest, workers drained, weights flushed.
    /// Idempotent; also runs on drop.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.db.shutdown();
        tracing::info!("node stopped");
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.stop();
    }
}
