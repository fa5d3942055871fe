//! # Weft Core
//!
//! Pure primitives for the weft record store: records, selectors, owners,
//! the Wharrgarbl proof of work, and genesis parameters.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Record`] - The signed, link-committing unit of storage
//! - [`RecordId`] - Content-addressed identifier (Shandwich-256 hash)
//! - [`Selector`] - Owner-blind index claim binding (name, ordinal) to a record
//! - [`Owner`] - A record-signing keypair (Ed25519 or NIST P-384)
//! - [`Wharrgarblr`] - The memory-hard collision-search proof of work
//!
//! ## Canonical encoding
//!
//! Records use a fixed binary layout with varint-prefixed variable fields;
//! the same record always serializes to the same bytes, so hashes are stable
//! across platforms. See [`record`].

pub mod cancel;
pub mod ecc;
pub mod error;
pub mod genesis;
pub mod hash;
pub mod owner;
pub mod record;
pub mod selector;
pub mod types;
pub mod wharrgarbl;
pub mod wire;

pub use cancel::CancelToken;
pub use ecc::{Curve, EccKeyPair, EccPublicKey};
pub use error::{CryptoError, GenesisError, RecordError};
pub use genesis::{create_genesis_records, GenesisParameters};
pub use hash::{sha256, sha3_512, shandwich256, Shandwich256};
pub use owner::{Owner, OwnerPublic, OwnerType};
pub use record::{Record, RecordBuilder, RecordLimits, WorkType, RECORD_MAX_SIZE};
pub use selector::{make_selector_key, Selector};
pub use types::RecordId;
pub use wharrgarbl::{
    record_wharrgarbl_cost, record_wharrgarbl_score, wharrgarbl_verify, Wharrgarblr,
    WHARRGARBL_PROOF_SIZE,
};

/// Current time in seconds since the Unix epoch.
pub fn time_sec() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs()
}
