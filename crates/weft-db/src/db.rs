//! The store facade: validated ingest, genesis bootstrap, queries, and the
//! replica-convergence surface.
//!
//! A store is a directory holding two files: the append-only record `log`
//! and the SQLite `index`. The in-memory weight graph is rebuilt from the
//! log on every open and propagation re-runs from scratch; because
//! propagation is convergent this is always safe, and it doubles as crash
//! recovery.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use weft_core::wire::Reader;
use weft_core::{
    record_wharrgarbl_cost, record_wharrgarbl_score, time_sec, GenesisParameters, Record,
    RecordId, RecordLimits,
};

use crate::error::{DbError, Result};
use crate::graph::{Graph, InsertNode, InsertOutcome};
use crate::index::Index;
use crate::log::RecordLog;

/// Config key under which genesis parameters persist in the index.
const GENESIS_CONFIG_KEY: &str = "genesis";

/// Tuning knobs for a store.
#[derive(Clone, Debug)]
pub struct DbConfig {
    /// Weight-propagation worker threads (0 means hardware parallelism).
    pub propagation_workers: usize,
    /// Own-weight floor for records carrying no proof of work.
    pub no_work_score: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            propagation_workers: 0,
            no_work_score: 1,
        }
    }
}

/// Callback fired after each successful append: `(offset, length, id)`.
/// The outer node uses it to gossip new records.
pub type RecordHook = Box<dyn Fn(u64, u32, &RecordId) + Send + Sync>;

/// Outcome of ingesting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Appended and indexed.
    Inserted { offset: u64, length: u32 },
    /// Already present; ingest was a no-op.
    Duplicate,
}

/// One query match.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub timestamp: u64,
    pub weight_lo: u64,
    pub weight_hi: u64,
    pub offset: u64,
    pub length: u32,
    pub id: RecordId,
    pub owner: Vec<u8>,
}

/// A local record store.
pub struct Db {
    dir: PathBuf,
    log: RecordLog,
    index: Index,
    graph: Arc<Graph>,
    params: RwLock<Option<GenesisParameters>>,
    config: DbConfig,
    hook: Option<RecordHook>,
    stopped: AtomicBool,
}

impl Db {
    /// Open (or create) a store in `dir`. An existing log is replayed to
    /// rebuild the graph; weights recompute from scratch.
    pub fn open(dir: &Path, config: DbConfig, hook: Option<RecordHook>) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let log = RecordLog::open(dir)?;
        let index = Index::open(dir)?;
        let graph = Graph::new(config.propagation_workers);

        let params = match index.get_config(GENESIS_CONFIG_KEY)? {
            Some(json) => {
                let mut p = GenesisParameters::default();
                p.update(&json)?;
                Some(p)
            }
            None => None,
        };

        let db = Self {
            dir: dir.to_path_buf(),
            log,
            index,
            graph,
            params: RwLock::new(params),
            config,
            hook,
            stopped: AtomicBool::new(false),
        };
        db.replay_log()?;
        tracing::info!(dir = %db.dir.display(), records = db.graph.len(), "store open");
        Ok(db)
    }

    /// Rebuild the in-memory graph from the log.
    fn replay_log(&self) -> Result<()> {
        let bytes = self.log.read_all()?;
        let mut r = Reader::new(&bytes);
        while r.remaining() > 0 {
            let start = r.position() as u64;
            let rec = Record::read_from(&mut r).map_err(|_| DbError::CorruptStored {
                offset: start,
            })?;
            let length = (r.position() as u64 - start) as u32;
            self.insert_node(&rec, start, length)?;
        }
        Ok(())
    }

    fn own_weight_of(&self, rec: &Record, length: u32) -> u64 {
        match rec.work {
            Some(_) => record_wharrgarbl_score(record_wharrgarbl_cost(length as usize)),
            None => self.config.no_work_score,
        }
    }

    /// Index and graph-insert one record already sitting in the log.
    fn insert_node(&self, rec: &Record, offset: u64, length: u32) -> Result<InsertOutcome> {
        let id = rec.hash();
        let mut selector_keys = Vec::with_capacity(rec.selectors.len());
        for i in 0..rec.selectors.len() {
            selector_keys.push(rec.selector_key(i)?);
        }
        let own_weight = self.own_weight_of(rec, length);
        self.index.insert_record(
            &id,
            offset,
            length,
            rec.timestamp,
            &rec.owner.to_bytes(),
            rec.links.len() as u32,
            own_weight,
            &selector_keys,
        )?;
        Ok(self.graph.insert(InsertNode {
            id,
            offset,
            length,
            own_weight,
            links: &rec.links,
        }))
    }

    /// The validation limits currently in force.
    pub fn limits(&self) -> RecordLimits {
        self.params
            .read()
            .as_ref()
            .map(|p| p.limits())
            .unwrap_or_default()
    }

    /// The persisted genesis parameters, if the store is initialized.
    pub fn genesis_params(&self) -> Option<GenesisParameters> {
        self.params.read().clone()
    }

    /// Bootstrap an empty store from concatenated genesis record bytes.
    ///
    /// The records are ingested unconditionally (no link minimum, no work
    /// check) and the parameters embedded in the first record's value are
    /// persisted. A no-op on an already-initialized store.
    pub fn initialize(&self, genesis_bytes: &[u8]) -> Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(DbError::ShutDown);
        }
        if self.params.read().is_some() {
            return Ok(());
        }
        let mut params = GenesisParameters::default();
        let mut r = Reader::new(genesis_bytes);
        let mut first = true;
        while r.remaining() > 0 {
            let rec = Record::read_from(&mut r)?;
            self.put_unchecked(&rec)?;
            if first {
                params.update(&rec.value)?;
                first = false;
            }
        }
        self.index
            .set_config(GENESIS_CONFIG_KEY, &params.to_json()?)?;
        tracing::info!(network = %params.name, "store initialized from genesis records");
        *self.params.write() = Some(params);
        Ok(())
    }

    /// Ingest a validated record. Duplicate ingest is a no-op success.
    pub fn put_record(&self, rec: &Record) -> Result<PutOutcome> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(DbError::ShutDown);
        }
        let id = rec.hash();
        if self.graph.locate(&id).is_some() {
            return Ok(PutOutcome::Duplicate);
        }
        rec.validate(&self.limits(), time_sec())?;
        self.put_unchecked(rec)
    }

    /// Decode and ingest record bytes from a peer.
    pub fn put_record_bytes(&self, bytes: &[u8]) -> Result<PutOutcome> {
        let rec = Record::from_bytes(bytes)?;
        self.put_record(&rec)
    }

    /// Append, index, and schedule propagation; no validation.
    fn put_unchecked(&self, rec: &Record) -> Result<PutOutcome> {
        let id = rec.hash();
        if self.graph.locate(&id).is_some() {
            return Ok(PutOutcome::Duplicate);
        }
        let bytes = rec.to_bytes();
        let (offset, length) = self.log.append(&bytes)?;
        match self.insert_node(rec, offset, length)? {
            InsertOutcome::Inserted => {
                tracing::debug!(id = %id, offset, length, "record stored");
                if let Some(hook) = &self.hook {
                    hook(offset, length, &id);
                }
                Ok(PutOutcome::Inserted { offset, length })
            }
            // Lost a race with an identical concurrent ingest; the log holds
            // a dead copy of the bytes, the index and graph stayed unique.
            InsertOutcome::Duplicate => Ok(PutOutcome::Duplicate),
        }
    }

    /// True while any record awaits predecessors or weight propagation.
    pub fn has_pending(&self) -> bool {
        self.graph.has_pending()
    }

    /// Deterministic replica digest; see [`Graph::crc64`].
    pub fn crc64(&self) -> u64 {
        self.graph.crc64()
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.graph.len()
    }

    /// Raw record bytes by log position.
    pub fn get_data_by_offset(&self, offset: u64, length: u32) -> Result<Vec<u8>> {
        self.log.read(offset, length)
    }

    /// Fetch and decode a record by id.
    pub fn get_record(&self, id: &RecordId) -> Result<Option<Record>> {
        match self.graph.locate(id) {
            Some((offset, length)) => {
                let bytes = self.log.read(offset, length)?;
                Ok(Some(Record::from_bytes(&bytes).map_err(|_| {
                    DbError::CorruptStored { offset }
                })?))
            }
            None => Ok(None),
        }
    }

    /// Range query over selector keys.
    ///
    /// For each `[low, high]` key range in order, matching records are
    /// reported selector-key ascending then timestamp ascending, filtered to
    /// `[ts_low, ts_high]`. The callback returning `false` stops the scan of
    /// the current range; later ranges still run.
    pub fn query<F>(
        &self,
        ts_low: u64,
        ts_high: u64,
        ranges: &[([u8; 32], [u8; 32])],
        mut callback: F,
    ) -> Result<()>
    where
        F: FnMut(&QueryResult) -> bool,
    {
        for (low, high) in ranges {
            let rows = self.index.query_range(low, high, ts_low, ts_high)?;
            for row in rows {
                let (weight_lo, weight_hi) = self.graph.weight_of(&row.id).unwrap_or((0, 0));
                let result = QueryResult {
                    timestamp: row.timestamp,
                    weight_lo,
                    weight_hi,
                    offset: row.offset,
                    length: row.length,
                    id: row.id,
                    owner: row.owner,
                };
                if !callback(&result) {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Snapshot cumulative weights into the index file.
    pub fn flush(&self) -> Result<()> {
        let snapshot = self.graph.weight_snapshot();
        self.index
            .flush_weights(snapshot.iter().map(|(id, lo, hi)| (id, *lo, *hi)))
    }

    /// Flush weights, stop the propagation workers, and refuse further
    /// ingest. Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "weight flush on shutdown failed");
        }
        self.graph.shutdown();
    }
}

impl Drop for Db {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::{make_selector_key, Owner, OwnerType, RecordBuilder};

    fn open_temp() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(dir.path(), DbConfig::default(), None).unwrap();
        (dir, db)
    }

    fn wait_settled(db: &Db) {
        let mut spins = 0;
        while db.has_pending() {
            std::thread::sleep(std::time::Duration::from_millis(5));
            spins += 1;
            assert!(spins < 2000, "store did not settle");
        }
    }

    fn simple_record(owner: &Owner, ts: u64, links: Vec<RecordId>) -> Record {
        RecordBuilder::new(ts)
            .value(format!("v{ts}").into_bytes())
            .links(links)
            .selector(b"test".to_vec(), format!("{ts:016x}").into_bytes())
            .sign(owner)
            .unwrap()
    }

    #[test]
    fn test_put_query_roundtrip() {
        let (_dir, db) = open_temp();
        let owner = Owner::generate(OwnerType::Ed25519).unwrap();
        let now = time_sec();
        let rec = simple_record(&owner, now, vec![]);
        let id = rec.hash();

        let outcome = db.put_record(&rec).unwrap();
        assert!(matches!(outcome, PutOutcome::Inserted { .. }));
        wait_settled(&db);

        let key = rec.selector_key(0).unwrap();
        let mut hits = Vec::new();
        db.query(0, u64::MAX, &[(key, key)], |qr| {
            hits.push(qr.clone());
            true
        })
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
        assert_eq!(hits[0].timestamp, now);
        assert_eq!(hits[0].owner, owner.public().to_bytes());

        // The reported offsets round-trip through the log.
        let bytes = db
            .get_data_by_offset(hits[0].offset, hits[0].length)
            .unwrap();
        assert_eq!(Record::from_bytes(&bytes).unwrap().hash(), id);
    }

    #[test]
    fn test_duplicate_put_is_noop_success() {
        let (_dir, db) = open_temp();
        let owner = Owner::generate(OwnerType::Ed25519).unwrap();
        let rec = simple_record(&owner, time_sec(), vec![]);

        assert!(matches!(
            db.put_record(&rec).unwrap(),
            PutOutcome::Inserted { .. }
        ));
        assert_eq!(db.put_record(&rec).unwrap(), PutOutcome::Duplicate);
        assert_eq!(db.record_count(), 1);
    }

    #[test]
    fn test_ingest_after_shutdown_is_rejected() {
        let (_dir, db) = open_temp();
        let owner = Owner::generate(OwnerType::Ed25519).unwrap();
        let rec = simple_record(&owner, time_sec(), vec![]);

        db.shutdown();
        assert!(matches!(db.put_record(&rec), Err(DbError::ShutDown)));
        assert!(matches!(
            db.put_record_bytes(&rec.to_bytes()),
            Err(DbError::ShutDown)
        ));
        assert!(matches!(db.initialize(&[]), Err(DbError::ShutDown)));
        db.shutdown(); // still idempotent
    }

    #[test]
    fn test_invalid_record_rejected_before_append() {
        let (_dir, db) = open_temp();
        let owner = Owner::generate(OwnerType::Ed25519).unwrap();
        let mut rec = simple_record(&owner, time_sec(), vec![]);
        rec.signature[0] ^= 1;
        assert!(db.put_record(&rec).is_err());
        assert_eq!(db.record_count(), 0);
        assert!(db.log.is_empty());
    }

    #[test]
    fn test_record_hook_fires_on_append() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let hook: RecordHook = Box::new(move |off, len, id| {
            seen2.lock().push((off, len, *id));
        });
        let db = Db::open(dir.path(), DbConfig::default(), Some(hook)).unwrap();

        let owner = Owner::generate(OwnerType::Ed25519).unwrap();
        let rec = simple_record(&owner, time_sec(), vec![]);
        db.put_record(&rec).unwrap();
        db.put_record(&rec).unwrap(); // duplicate must not re-fire

        let calls = seen.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].2, rec.hash());
    }

    #[test]
    fn test_linked_records_accumulate_weight() {
        let (_dir, db) = open_temp();
        let owner = Owner::generate(OwnerType::Ed25519).unwrap();
        let now = time_sec();
        let a = simple_record(&owner, now, vec![]);
        let b = simple_record(&owner, now + 1, vec![a.hash()]);
        let c = simple_record(&owner, now + 2, vec![a.hash(), b.hash()]);
        for r in [&a, &b, &c] {
            db.put_record(r).unwrap();
        }
        wait_settled(&db);

        let key = a.selector_key(0).unwrap();
        let mut weight = None;
        db.query(0, u64::MAX, &[(key, key)], |qr| {
            weight = Some((qr.weight_lo, qr.weight_hi));
            true
        })
        .unwrap();
        // Default no-work score is 1 per record; a has three descendants.
        assert_eq!(weight, Some((3, 0)));
    }

    #[test]
    fn test_reopen_replays_log_and_recomputes_weights() {
        let dir = tempfile::tempdir().unwrap();
        let owner = Owner::generate(OwnerType::Ed25519).unwrap();
        let now = time_sec();
        let a = simple_record(&owner, now, vec![]);
        let b = simple_record(&owner, now + 1, vec![a.hash()]);

        let crc_before;
        {
            let db = Db::open(dir.path(), DbConfig::default(), None).unwrap();
            db.put_record(&a).unwrap();
            db.put_record(&b).unwrap();
            wait_settled(&db);
            crc_before = db.crc64();
        }

        let db = Db::open(dir.path(), DbConfig::default(), None).unwrap();
        wait_settled(&db);
        assert_eq!(db.record_count(), 2);
        assert_eq!(db.crc64(), crc_before);
        assert_eq!(db.get_record(&a.hash()).unwrap().unwrap().hash(), a.hash());
    }

    #[test]
    fn test_genesis_bootstrap_and_link_enforcement() {
        let (_dir, db) = open_temp();
        let mut params = GenesisParameters::default();
        params.name = "testnet".into();
        params.record_min_links = 2;
        let (records, owner) =
            weft_core::create_genesis_records(OwnerType::Ed25519, &params).unwrap();

        let mut blob = Vec::new();
        for r in &records {
            blob.extend_from_slice(&r.to_bytes());
        }
        db.initialize(&blob).unwrap();
        wait_settled(&db);
        assert_eq!(db.record_count(), 2);
        assert_eq!(db.genesis_params().unwrap().name, "testnet");

        // A record with too few links is now rejected...
        let lonely = simple_record(&owner, time_sec(), vec![records[0].hash()]);
        assert!(matches!(
            db.put_record(&lonely),
            Err(DbError::Record(weft_core::RecordError::LinkCountInvalid { .. }))
        ));

        // ...and one meeting the minimum is accepted.
        let ok = simple_record(
            &owner,
            time_sec(),
            vec![records[0].hash(), records[1].hash()],
        );
        assert!(matches!(
            db.put_record(&ok).unwrap(),
            PutOutcome::Inserted { .. }
        ));

        // Re-initializing is a no-op.
        db.initialize(&blob).unwrap();
        assert_eq!(db.record_count(), 3);
    }

    #[test]
    fn test_query_range_and_early_stop() {
        let (_dir, db) = open_temp();
        let owner = Owner::generate(OwnerType::Ed25519).unwrap();
        let now = time_sec();
        for i in 0..8u64 {
            let rec = RecordBuilder::new(now + i)
                .value(b"v".to_vec())
                .selector(b"series".to_vec(), format!("{i:016x}").into_bytes())
                .sign(&owner)
                .unwrap();
            db.put_record(&rec).unwrap();
        }
        wait_settled(&db);

        let low = make_selector_key(b"series", b"0000000000000000");
        let high = make_selector_key(b"series", b"ffffffffffffffff");

        let mut count = 0;
        db.query(0, u64::MAX, &[(low, high)], |_| {
            count += 1;
            true
        })
        .unwrap();
        assert_eq!(count, 8);

        // Early stop after three.
        let mut count = 0;
        db.query(0, u64::MAX, &[(low, high)], |_| {
            count += 1;
            count < 3
        })
        .unwrap();
        assert_eq!(count, 3);

        // Timestamp bounds.
        let mut count = 0;
        db.query(now + 2, now + 4, &[(low, high)], |_| {
            count += 1;
            true
        })
        .unwrap();
        assert_eq!(count, 3);
    }
}
