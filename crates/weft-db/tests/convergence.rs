//! Replica convergence: independently seeded stores fed the same record
//! multiset in different random orders must reach byte-identical weight
//! state, observable through equal CRC-64 digests and identical query
//! results.

use std::time::Duration;

use weft_core::{make_selector_key, Record};
use weft_testkit::{CorpusConfig, TempStore, TestCorpus};

const STORES: usize = 3;
const RECORDS: usize = 256;
const OWNERS: usize = 8;
const SETTLE_TIMEOUT: Duration = Duration::from_secs(120);

fn build_stores(corpus: &TestCorpus) -> Vec<TempStore> {
    (0..STORES)
        .map(|_| {
            let store = TempStore::new();
            for i in corpus.shuffled_order() {
                store
                    .db
                    .put_record(&corpus.records[i])
                    .expect("ingest generated record");
            }
            store
        })
        .collect()
}

#[test]
fn replicas_converge_to_equal_crc64() {
    let corpus = TestCorpus::generate(CorpusConfig {
        records: RECORDS,
        owners: OWNERS,
        ..Default::default()
    });
    let stores = build_stores(&corpus);

    for store in &stores {
        store.wait_settled(SETTLE_TIMEOUT);
    }

    let crcs: Vec<u64> = stores.iter().map(|s| s.db.crc64()).collect();
    for crc in &crcs[1..] {
        assert_eq!(
            *crc, crcs[0],
            "replicas fed the same records disagree on weight state"
        );
    }

    // Every store holds every record.
    for store in &stores {
        assert_eq!(store.db.record_count(), RECORDS);
    }
}

#[test]
fn every_record_reachable_by_its_selector_key() {
    let corpus = TestCorpus::generate(CorpusConfig {
        records: RECORDS,
        owners: OWNERS,
        ..Default::default()
    });
    let stores = build_stores(&corpus);
    for store in &stores {
        store.wait_settled(SETTLE_TIMEOUT);
    }

    let mut total = 0usize;
    for store in &stores {
        for (ri, key) in corpus.selector_keys.iter().enumerate() {
            store
                .db
                .query(0, u64::MAX, &[(*key, *key)], |qr| {
                    let bytes = store
                        .db
                        .get_data_by_offset(qr.offset, qr.length)
                        .expect("offset from query resolves");
                    let rec = Record::from_bytes(&bytes).expect("stored record decodes");
                    let value = rec.get_value(Some(&corpus.config.masking_key));
                    assert_eq!(
                        value.as_ref(),
                        &corpus.values[ri][..],
                        "unmasked value mismatch for record {ri}"
                    );
                    total += 1;
                    true
                })
                .expect("query");
        }
    }
    assert_eq!(total, RECORDS * STORES);
}

#[test]
fn owner_ordinal_ranges_cover_the_corpus() {
    let corpus = TestCorpus::generate(CorpusConfig {
        records: RECORDS,
        owners: OWNERS,
        ..Default::default()
    });
    let stores = build_stores(&corpus);
    for store in &stores {
        store.wait_settled(SETTLE_TIMEOUT);
    }

    let mut total = 0usize;
    for store in &stores {
        for oi in 0..OWNERS {
            let name = TestCorpus::owner_selector_name(oi);
            let low = make_selector_key(&name, b"0000000000000000");
            let high = make_selector_key(&name, b"ffffffffffffffff");
            let mut per_owner = 0usize;
            store
                .db
                .query(0, u64::MAX, &[(low, high)], |qr| {
                    assert!(
                        store.db.get_data_by_offset(qr.offset, qr.length).is_ok(),
                        "range hit does not resolve in the log"
                    );
                    per_owner += 1;
                    true
                })
                .expect("range query");
            assert_eq!(
                per_owner,
                corpus.records_per_owner(oi),
                "owner {oi} range scan missed records"
            );
            total += per_owner;
        }
    }
    assert_eq!(total, RECORDS * STORES);
}
