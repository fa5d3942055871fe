//! The `index` database: id → (offset, length) plus per-record weight state
//! and the selector-key index that backs range queries.
//!
//! SQLite (bundled) provides the B-tree; the schema is versioned with a
//! simple migration table. Everything authoritative about weights lives in
//! the graph engine; the columns here are a flush-time snapshot, rebuilt
//! from the log on open.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::Result;
use weft_core::RecordId;

pub const INDEX_FILE_NAME: &str = "index";

/// Current schema version.
const CURRENT_VERSION: u32 = 1;

/// One row handed to the query callback machinery.
#[derive(Debug, Clone)]
pub struct IndexRow {
    pub selector_key: [u8; 32],
    pub timestamp: u64,
    pub offset: u64,
    pub length: u32,
    pub id: RecordId,
    pub owner: Vec<u8>,
}

/// The SQLite-backed index file.
pub struct Index {
    conn: Mutex<Connection>,
}

impl Index {
    /// Open (or create) the index inside `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut conn = Connection::open(dir.join(INDEX_FILE_NAME))?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a record row and its selector keys in one transaction.
    /// Idempotent: re-inserting an existing id is a no-op.
    pub fn insert_record(
        &self,
        id: &RecordId,
        offset: u64,
        length: u32,
        timestamp: u64,
        owner: &[u8],
        link_count: u32,
        own_weight: u64,
        selector_keys: &[[u8; 32]],
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO records
             (id, doff, dlen, ts, owner, link_count, own_weight, weight_lo, weight_hi)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0)",
            params![
                id.as_bytes().as_slice(),
                offset as i64,
                length as i64,
                timestamp as i64,
                owner,
                link_count as i64,
                own_weight as i64,
            ],
        )?;
        for skey in selector_keys {
            tx.execute(
                "INSERT OR IGNORE INTO selectors (skey, ts, record_id) VALUES (?1, ?2, ?3)",
                params![skey.as_slice(), timestamp as i64, id.as_bytes().as_slice()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Whether a record id is present.
    pub fn has_record(&self, id: &RecordId) -> Result<bool> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM records WHERE id = ?1",
                params![id.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Number of indexed records.
    pub fn record_count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Selector-key range scan, ordered by key then timestamp.
    pub fn query_range(
        &self,
        key_low: &[u8; 32],
        key_high: &[u8; 32],
        ts_low: u64,
        ts_high: u64,
    ) -> Result<Vec<IndexRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT s.skey, s.ts, r.doff, r.dlen, r.id, r.owner
             FROM selectors s JOIN records r ON r.id = s.record_id
             WHERE s.skey >= ?1 AND s.skey <= ?2 AND s.ts >= ?3 AND s.ts <= ?4
             ORDER BY s.skey ASC, s.ts ASC",
        )?;
        let ts_low = ts_low.min(i64::MAX as u64) as i64;
        let ts_high = ts_high.min(i64::MAX as u64) as i64;
        let rows = stmt.query_map(
            params![key_low.as_slice(), key_high.as_slice(), ts_low, ts_high],
            |row| {
                let skey: Vec<u8> = row.get(0)?;
                let ts: i64 = row.get(1)?;
                let doff: i64 = row.get(2)?;
                let dlen: i64 = row.get(3)?;
                let id: Vec<u8> = row.get(4)?;
                let owner: Vec<u8> = row.get(5)?;
                Ok((skey, ts, doff, dlen, id, owner))
            },
        )?;

        let mut out = Vec::new();
        for row in rows {
            let (skey, ts, doff, dlen, id, owner) = row?;
            let mut selector_key = [0u8; 32];
            selector_key.copy_from_slice(&skey);
            let mut id_arr = [0u8; 32];
            id_arr.copy_from_slice(&id);
            out.push(IndexRow {
                selector_key,
                timestamp: ts as u64,
                offset: doff as u64,
                length: dlen as u32,
                id: RecordId(id_arr),
                owner,
            });
        }
        Ok(out)
    }

    /// Snapshot cumulative weights into the index.
    pub fn flush_weights<'a, I>(&self, weights: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a RecordId, u64, u64)>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for (id, lo, hi) in weights {
            tx.execute(
                "UPDATE records SET weight_lo = ?1, weight_hi = ?2 WHERE id = ?3",
                params![lo as i64, hi as i64, id.as_bytes().as_slice()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Read a config blob.
    pub fn get_config(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let v: Option<Vec<u8>> = conn
            .query_row(
                "SELECT v FROM config WHERE k = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(v)
    }

    /// Write a config blob.
    pub fn set_config(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO config (k, v) VALUES (?1, ?2)
             ON CONFLICT(k) DO UPDATE SET v = excluded.v",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Initialize or migrate the schema. Idempotent.
fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;
        for version in (current + 1)..=CURRENT_VERSION {
            match version {
                1 => apply_v1(&tx)?,
                _ => unreachable!("unknown migration version"),
            }
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, strftime('%s','now'))",
                params![version],
            )?;
        }
        tx.commit()?;
    }
    Ok(())
}

fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per stored record; weights are a flush-time snapshot.
        CREATE TABLE records (
            id BLOB PRIMARY KEY,          -- 32 bytes, Shandwich-256 of the record
            doff INTEGER NOT NULL,        -- byte offset in the log file
            dlen INTEGER NOT NULL,        -- serialized length
            ts INTEGER NOT NULL,          -- owner-claimed timestamp (seconds)
            owner BLOB NOT NULL,          -- owner public key bytes
            link_count INTEGER NOT NULL,
            own_weight INTEGER NOT NULL,
            weight_lo INTEGER NOT NULL DEFAULT 0,
            weight_hi INTEGER NOT NULL DEFAULT 0
        );

        -- Selector keys; the primary key doubles as the range-scan index.
        CREATE TABLE selectors (
            skey BLOB NOT NULL,           -- 32-byte selector key
            ts INTEGER NOT NULL,
            record_id BLOB NOT NULL,
            PRIMARY KEY (skey, ts, record_id)
        ) WITHOUT ROWID;

        -- Durable store-level configuration (genesis parameters).
        CREATE TABLE config (
            k TEXT PRIMARY KEY,
            v BLOB NOT NULL
        );
        "#,
    )?;
    Ok(())
}
