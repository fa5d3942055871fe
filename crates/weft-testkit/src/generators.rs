//! Corpus generation for convergence and query tests.
//!
//! Builds a DAG of signed records the way a live network would: each record
//! links to up to three earlier records, carries one selector whose name is
//! the owner index and whose ordinal is the record index (both `%016x`), and
//! stores its value masked.

use rand::seq::SliceRandom;
use rand::Rng;

use weft_core::{Owner, OwnerType, Record, RecordBuilder, RecordId, time_sec};

/// Shape of a generated corpus.
#[derive(Clone, Debug)]
pub struct CorpusConfig {
    pub records: usize,
    pub owners: usize,
    pub max_links: usize,
    pub masking_key: Vec<u8>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            records: 1024,
            owners: 8,
            max_links: 3,
            masking_key: b"maskingkey".to_vec(),
        }
    }
}

/// A generated corpus of linked records.
pub struct TestCorpus {
    pub config: CorpusConfig,
    pub owners: Vec<Owner>,
    pub records: Vec<Record>,
    /// Plaintext values, index-aligned with `records`.
    pub values: Vec<Vec<u8>>,
    /// Primary selector key of each record.
    pub selector_keys: Vec<[u8; 32]>,
}

impl TestCorpus {
    /// Generate a corpus. Records are returned in creation order; ingest
    /// them shuffled to exercise out-of-order convergence.
    pub fn generate(config: CorpusConfig) -> Self {
        let mut rng = rand::thread_rng();
        let owners: Vec<Owner> = (0..config.owners)
            .map(|_| Owner::generate(OwnerType::Ed25519).expect("owner keygen"))
            .collect();

        let mut records: Vec<Record> = Vec::with_capacity(config.records);
        let mut values = Vec::with_capacity(config.records);
        let mut selector_keys = Vec::with_capacity(config.records);
        // Backdate so the newest record still sits inside the forward-drift
        // window when the corpus is validated at ingest.
        let mut ts = time_sec().saturating_sub(config.records as u64 + 1);

        for ri in 0..config.records {
            // Link to up to `max_links` distinct earlier records.
            let mut link_to: Vec<usize> = Vec::new();
            let limit = config.max_links.min(ri);
            while link_to.len() < limit {
                let candidate = rng.gen_range(0..ri);
                if !link_to.contains(&candidate) {
                    link_to.push(candidate);
                }
            }
            let links: Vec<RecordId> = link_to.iter().map(|&i| records[i].hash()).collect();

            let owner_idx = ri % config.owners;
            ts += 1;
            let value = ts.to_string().into_bytes();
            let name = format!("{owner_idx:016x}");
            let ordinal = format!("{ri:016x}");

            let rec = RecordBuilder::new(ts)
                .value(value.clone())
                .masking_key(config.masking_key.clone())
                .links(links)
                .selector(name.into_bytes(), ordinal.into_bytes())
                .sign(&owners[owner_idx])
                .expect("record build");

            selector_keys.push(rec.selector_key(0).expect("selector key"));
            values.push(value);
            records.push(rec);
        }

        Self {
            config,
            owners,
            records,
            values,
            selector_keys,
        }
    }

    /// Indices `0..records` in a fresh random order.
    pub fn shuffled_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.records.len()).collect();
        order.shuffle(&mut rand::thread_rng());
        order
    }

    /// The selector name used for `owner_idx`.
    pub fn owner_selector_name(owner_idx: usize) -> Vec<u8> {
        format!("{owner_idx:016x}").into_bytes()
    }

    /// Records each owner contributed.
    pub fn records_per_owner(&self, owner_idx: usize) -> usize {
        let n = self.records.len();
        let k = self.config.owners;
        n / k + usize::from(owner_idx < n % k)
    }
}
