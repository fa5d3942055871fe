//! Error types for weft-core.

use thiserror::Error;

/// Errors from the low-level cryptographic primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key generation failed")]
    Generate,

    #[error("public key compression failed")]
    Compress,

    #[error("public key decompression failed")]
    Decompress,

    #[error("signing failed")]
    Sign,

    #[error("signature verification failed")]
    Verify,

    #[error("public key recovery failed")]
    Recover,
}

/// Errors from record construction, decoding, and validation.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record is truncated or malformed: {0}")]
    Corrupt(&'static str),

    #[error("unknown record format version {0}")]
    UnknownVersion(u8),

    #[error("unknown owner type {0}")]
    UnknownOwnerType(u8),

    #[error("unknown work type {0}")]
    UnknownWorkType(u8),

    #[error("owner signature verification failed")]
    BadSignature,

    #[error("proof of work is missing or insufficient")]
    BadProofOfWork,

    #[error("timestamp {ts} outside allowed window [{floor}, {ceiling}]")]
    TimestampOutOfRange { ts: u64, floor: u64, ceiling: u64 },

    #[error("selector {index} is invalid")]
    SelectorInvalid { index: usize },

    #[error("value of {size} bytes exceeds maximum {max}")]
    ValueTooLarge { size: usize, max: usize },

    #[error("record of {size} bytes exceeds maximum {max}")]
    RecordTooLarge { size: usize, max: usize },

    #[error("record has {count} links, {min} required")]
    LinkCountInvalid { count: usize, min: usize },

    #[error("duplicate link in record")]
    DuplicateLink,

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from genesis parameter handling.
#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("invalid genesis parameter JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Record(#[from] RecordError),
}
