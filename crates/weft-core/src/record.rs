//! Records: the signed, link-committing unit of storage.
//!
//! A record commits to one or more prior record hashes, carries an optional
//! proof of work sized to its serialization, and is signed by its owner over
//! everything that precedes the signature. Its content address (the
//! [`RecordId`]) is the Shandwich-256 of the complete serialization, so a
//! record is immutable once created.
//!
//! ## Canonical layout
//!
//! ```text
//! flags:1  timestamp:uvarint  owner_type:1  owner_pub:(32|49)
//! link_count:uvarint  link_id:32 × N
//! selector_count:uvarint  selector × N
//! value_len:uvarint  value
//! cert_len:uvarint  cert
//! work_type:1  [work:20]
//! signature:(64|96)
//! ```
//!
//! The upper nibble of `flags` is the format version (0). The proof-of-work
//! input is the serialization up to and excluding the work section; the
//! signed message is the serialization up to and excluding the signature.
//!
//! ## Value masking
//!
//! Values may be stored masked: XORed with an AES-256-CTR keystream keyed by
//! SHA-256 of the masking key and IV-bound to the owner and timestamp.
//! Unmasking is not authenticated; a wrong key yields pseudo-random bytes
//! and it is up to higher layers to notice.

use aes::Aes256;
use bytes::Bytes;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;

use crate::cancel::CancelToken;
use crate::error::RecordError;
use crate::hash::{sha256, shandwich256, Shandwich256};
use crate::owner::{Owner, OwnerPublic, OwnerType};
use crate::selector::Selector;
use crate::types::RecordId;
use crate::wharrgarbl::{
    record_wharrgarbl_cost, wharrgarbl_verify, Wharrgarblr, WHARRGARBL_PROOF_SIZE,
};
use crate::wire::{put_uvarint, Reader};

/// Hard ceiling on serialized record size.
pub const RECORD_MAX_SIZE: usize = 65536;

/// Default ceiling on value size; networks may lower it via genesis parameters.
pub const RECORD_DEFAULT_MAX_VALUE_SIZE: usize = 1024;

/// Decode-time sanity caps.
const MAX_LINKS: usize = 2048;
const MAX_SELECTORS: usize = 16;
const MAX_CERT_SIZE: usize = 8192;

/// Flag bit: the stored value is masked.
pub const FLAG_VALUE_MASKED: u8 = 0x01;

const VERSION_MASK: u8 = 0xf0;

/// Kind of attached proof of work.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum WorkType {
    None = 0,
    Wharrgarbl = 1,
}

/// Validation limits, normally sourced from the network's genesis parameters.
#[derive(Clone, Debug)]
pub struct RecordLimits {
    pub timestamp_floor: u64,
    pub max_forward_time_drift: u64,
    pub min_links: usize,
    pub max_value_size: usize,
    pub max_size: usize,
    pub work_required: bool,
}

impl Default for RecordLimits {
    fn default() -> Self {
        Self {
            timestamp_floor: 0,
            max_forward_time_drift: 15,
            min_links: 0,
            max_value_size: RECORD_DEFAULT_MAX_VALUE_SIZE,
            max_size: RECORD_MAX_SIZE,
            work_required: false,
        }
    }
}

/// How much of a record to serialize.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Until {
    /// Everything before the work section (the PoW input).
    Work,
    /// Everything before the signature (the signed message).
    Signature,
    /// The complete record.
    End,
}

/// A fully formed record.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Record {
    pub flags: u8,
    /// Seconds since the Unix epoch, claimed by the owner.
    pub timestamp: u64,
    pub owner: OwnerPublic,
    /// Predecessor record IDs, sorted ascending, no duplicates.
    pub links: Vec<RecordId>,
    pub selectors: Vec<Selector>,
    /// The stored value (masked if `FLAG_VALUE_MASKED` is set).
    pub value: Bytes,
    pub certificate: Option<Bytes>,
    pub work: Option<[u8; WHARRGARBL_PROOF_SIZE]>,
    pub signature: Vec<u8>,
}

fn mask_keystream(masking_key: &[u8], owner: &OwnerPublic, timestamp: u64, data: &mut [u8]) {
    let key = sha256(masking_key);
    let mut iv_input = owner.to_bytes();
    iv_input.extend_from_slice(&timestamp.to_be_bytes());
    let iv_full = shandwich256(&iv_input);
    let mut cipher = Ctr128BE::<Aes256>::new_from_slices(&key, &iv_full[..16])
        .expect("fixed-width key and IV");
    cipher.apply_keystream(data);
}

fn body_hash_parts(
    flags: u8,
    timestamp: u64,
    owner: &OwnerPublic,
    links: &[RecordId],
    value: &[u8],
) -> [u8; 32] {
    let mut h = Shandwich256::new();
    let mut buf = Vec::with_capacity(64 + links.len() * 32 + value.len());
    buf.push(flags);
    put_uvarint(&mut buf, timestamp);
    buf.push(owner.owner_type().to_u8());
    buf.extend_from_slice(&owner.to_bytes());
    put_uvarint(&mut buf, links.len() as u64);
    for link in links {
        buf.extend_from_slice(link.as_bytes());
    }
    put_uvarint(&mut buf, value.len() as u64);
    buf.extend_from_slice(value);
    h.update(&buf);
    h.finalize()
}

impl Record {
    fn serialize_until(&self, until: Until) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.value.len() + self.links.len() * 32 + 256);
        buf.push(self.flags);
        put_uvarint(&mut buf, self.timestamp);
        buf.push(self.owner.owner_type().to_u8());
        buf.extend_from_slice(&self.owner.to_bytes());
        put_uvarint(&mut buf, self.links.len() as u64);
        for link in &self.links {
            buf.extend_from_slice(link.as_bytes());
        }
        put_uvarint(&mut buf, self.selectors.len() as u64);
        for sel in &self.selectors {
            sel.write_to(&mut buf);
        }
        put_uvarint(&mut buf, self.value.len() as u64);
        buf.extend_from_slice(&self.value);
        match &self.certificate {
            Some(cert) => {
                put_uvarint(&mut buf, cert.len() as u64);
                buf.extend_from_slice(cert);
            }
            None => put_uvarint(&mut buf, 0),
        }
        if until == Until::Work {
            return buf;
        }
        match &self.work {
            Some(proof) => {
                buf.push(WorkType::Wharrgarbl as u8);
                buf.extend_from_slice(proof);
            }
            None => buf.push(WorkType::None as u8),
        }
        if until == Until::Signature {
            return buf;
        }
        buf.extend_from_slice(&self.signature);
        buf
    }

    /// The complete canonical serialization.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.serialize_until(Until::End)
    }

    /// Write the canonical serialization to `w`.
    pub fn write_to<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.to_bytes())
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    /// The record's content address: Shandwich-256 of the serialization.
    pub fn hash(&self) -> RecordId {
        RecordId(shandwich256(&self.to_bytes()))
    }

    /// The hash selectors claim: covers flags, timestamp, owner, links, and
    /// the stored value, independently of the selectors themselves.
    pub fn body_hash(&self) -> [u8; 32] {
        body_hash_parts(
            self.flags,
            self.timestamp,
            &self.owner,
            &self.links,
            &self.value,
        )
    }

    /// The index key of selector `i`.
    pub fn selector_key(&self, i: usize) -> Result<[u8; 32], RecordError> {
        let sel = self
            .selectors
            .get(i)
            .ok_or(RecordError::Corrupt("selector index out of range"))?;
        sel.key(&self.body_hash())
            .map_err(|_| RecordError::SelectorInvalid { index: i })
    }

    /// Retrieve the value, unmasking with `masking_key` when the record is
    /// masked. A wrong key silently yields pseudo-random bytes.
    pub fn get_value(&self, masking_key: Option<&[u8]>) -> Bytes {
        if self.flags & FLAG_VALUE_MASKED == 0 {
            return self.value.clone();
        }
        match masking_key {
            None => self.value.clone(),
            Some(key) => {
                let mut data = self.value.to_vec();
                mask_keystream(key, &self.owner, self.timestamp, &mut data);
                Bytes::from(data)
            }
        }
    }

    /// Decode a record from a cursor, leaving the cursor just past it.
    pub fn read_from(r: &mut Reader<'_>) -> Result<Self, RecordError> {
        let flags = r.u8("flags")?;
        let version = (flags & VERSION_MASK) >> 4;
        if version != 0 {
            return Err(RecordError::UnknownVersion(version));
        }
        let timestamp = r.uvarint("timestamp")?;
        let type_tag = r.u8("owner type")?;
        let owner_type =
            OwnerType::from_u8(type_tag).ok_or(RecordError::UnknownOwnerType(type_tag))?;
        let owner = OwnerPublic::from_bytes(owner_type, r.bytes(owner_type.public_len(), "owner")?)?;

        let link_count = r.uvarint("link count")? as usize;
        if link_count > MAX_LINKS {
            return Err(RecordError::Corrupt("link count"));
        }
        let mut links = Vec::with_capacity(link_count);
        for _ in 0..link_count {
            links.push(RecordId(r.array::<32>("link")?));
        }

        let selector_count = r.uvarint("selector count")? as usize;
        if selector_count > MAX_SELECTORS {
            return Err(RecordError::Corrupt("selector count"));
        }
        let mut selectors = Vec::with_capacity(selector_count);
        for _ in 0..selector_count {
            selectors.push(Selector::read_from(r)?);
        }

        let value = Bytes::copy_from_slice(r.var_bytes(RECORD_MAX_SIZE, "value")?);
        let cert = r.var_bytes(MAX_CERT_SIZE, "certificate")?;
        let certificate = if cert.is_empty() {
            None
        } else {
            Some(Bytes::copy_from_slice(cert))
        };

        let work_tag = r.u8("work type")?;
        let work = match work_tag {
            0 => None,
            1 => Some(r.array::<WHARRGARBL_PROOF_SIZE>("work")?),
            other => return Err(RecordError::UnknownWorkType(other)),
        };

        let signature = r.bytes(owner_type.signature_len(), "signature")?.to_vec();

        Ok(Self {
            flags,
            timestamp,
            owner,
            links,
            selectors,
            value,
            certificate,
            work,
            signature,
        })
    }

    /// Decode a record that occupies the whole of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() > RECORD_MAX_SIZE {
            return Err(RecordError::RecordTooLarge {
                size: bytes.len(),
                max: RECORD_MAX_SIZE,
            });
        }
        let mut r = Reader::new(bytes);
        let rec = Self::read_from(&mut r)?;
        if r.remaining() != 0 {
            return Err(RecordError::Corrupt("trailing bytes"));
        }
        Ok(rec)
    }

    /// Validate the record against `limits`, with `now` in epoch seconds.
    ///
    /// Order: structural bounds, timestamp window, selector claims, proof of
    /// work, owner signature.
    pub fn validate(&self, limits: &RecordLimits, now: u64) -> Result<(), RecordError> {
        let size = self.size();
        if size > limits.max_size || size > RECORD_MAX_SIZE {
            return Err(RecordError::RecordTooLarge {
                size,
                max: limits.max_size.min(RECORD_MAX_SIZE),
            });
        }
        if self.value.len() > limits.max_value_size {
            return Err(RecordError::ValueTooLarge {
                size: self.value.len(),
                max: limits.max_value_size,
            });
        }
        if self.links.len() < limits.min_links {
            return Err(RecordError::LinkCountInvalid {
                count: self.links.len(),
                min: limits.min_links,
            });
        }
        for pair in self.links.windows(2) {
            if pair[0] >= pair[1] {
                return Err(RecordError::DuplicateLink);
            }
        }

        let ceiling = now + limits.max_forward_time_drift;
        if self.timestamp < limits.timestamp_floor || self.timestamp > ceiling {
            return Err(RecordError::TimestampOutOfRange {
                ts: self.timestamp,
                floor: limits.timestamp_floor,
                ceiling,
            });
        }

        let body = self.body_hash();
        for (i, sel) in self.selectors.iter().enumerate() {
            sel.key(&body)
                .map_err(|_| RecordError::SelectorInvalid { index: i })?;
        }

        match &self.work {
            Some(proof) => {
                let input = self.serialize_until(Until::Work);
                let score = wharrgarbl_verify(proof, &input);
                if score == 0 || score < record_wharrgarbl_cost(size) {
                    return Err(RecordError::BadProofOfWork);
                }
            }
            None => {
                if limits.work_required {
                    return Err(RecordError::BadProofOfWork);
                }
            }
        }

        let signed = self.serialize_until(Until::Signature);
        self.owner.verify(&signed, &self.signature)?;
        Ok(())
    }
}

/// Builder for creating signed records.
pub struct RecordBuilder {
    timestamp: u64,
    value: Vec<u8>,
    masking_key: Option<Vec<u8>>,
    links: Vec<RecordId>,
    selectors: Vec<(Vec<u8>, Vec<u8>)>,
    certificate: Option<Vec<u8>>,
}

impl RecordBuilder {
    /// Start building a record with the given owner-claimed timestamp.
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp,
            value: Vec::new(),
            masking_key: None,
            links: Vec::new(),
            selectors: Vec::new(),
            certificate: None,
        }
    }

    /// Set the plaintext value.
    pub fn value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = value.into();
        self
    }

    /// Mask the value with this key before storing.
    pub fn masking_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.masking_key = Some(key.into());
        self
    }

    /// Add a predecessor link.
    pub fn link(mut self, id: RecordId) -> Self {
        self.links.push(id);
        self
    }

    /// Add several predecessor links.
    pub fn links(mut self, ids: impl IntoIterator<Item = RecordId>) -> Self {
        self.links.extend(ids);
        self
    }

    /// Add a selector claim for `(name, ordinal)`.
    pub fn selector(mut self, name: impl Into<Vec<u8>>, ordinal: impl Into<Vec<u8>>) -> Self {
        self.selectors.push((name.into(), ordinal.into()));
        self
    }

    /// Attach an opaque CA credential.
    pub fn certificate(mut self, cert: impl Into<Vec<u8>>) -> Self {
        self.certificate = Some(cert.into());
        self
    }

    /// Build and sign without proof of work.
    pub fn sign(self, owner: &Owner) -> Result<Record, RecordError> {
        self.build(owner, None)
    }

    /// Build, attach a Wharrgarbl proof sized to the record, and sign.
    pub fn work_and_sign(
        self,
        owner: &Owner,
        prover: &Wharrgarblr,
        cancel: &CancelToken,
    ) -> Result<Record, RecordError> {
        self.build(owner, Some((prover, cancel)))
    }

    fn build(
        mut self,
        owner: &Owner,
        prover: Option<(&Wharrgarblr, &CancelToken)>,
    ) -> Result<Record, RecordError> {
        if self.value.len() > RECORD_DEFAULT_MAX_VALUE_SIZE {
            return Err(RecordError::ValueTooLarge {
                size: self.value.len(),
                max: RECORD_DEFAULT_MAX_VALUE_SIZE,
            });
        }
        if self.selectors.len() > MAX_SELECTORS {
            return Err(RecordError::Corrupt("too many selectors"));
        }
        self.links.sort();
        for pair in self.links.windows(2) {
            if pair[0] == pair[1] {
                return Err(RecordError::DuplicateLink);
            }
        }

        let mut flags = 0u8;
        let mut stored_value = self.value;
        if let Some(key) = &self.masking_key {
            mask_keystream(key, owner.public(), self.timestamp, &mut stored_value);
            flags |= FLAG_VALUE_MASKED;
        }

        let mut record = Record {
            flags,
            timestamp: self.timestamp,
            owner: owner.public().clone(),
            links: self.links,
            selectors: Vec::new(),
            value: Bytes::from(stored_value),
            certificate: self.certificate.map(Bytes::from),
            work: None,
            signature: Vec::new(),
        };

        let body = record.body_hash();
        record.selectors = self
            .selectors
            .iter()
            .map(|(name, ordinal)| Selector::set(name, ordinal, &body))
            .collect();

        if let Some((prover, cancel)) = prover {
            let input = record.serialize_until(Until::Work);
            // Difficulty is sized to the final record: prefix + work section + signature.
            let final_size = input.len()
                + 1
                + WHARRGARBL_PROOF_SIZE
                + owner.owner_type().signature_len();
            let difficulty = record_wharrgarbl_cost(final_size);
            let (proof, _) = prover
                .compute(&input, difficulty, cancel)
                .ok_or(RecordError::Cancelled)?;
            record.work = Some(proof);
        }

        let signed = record.serialize_until(Until::Signature);
        record.signature = owner.sign(&signed)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::random_bytes;

    fn test_owner() -> Owner {
        Owner::generate(OwnerType::Ed25519).unwrap()
    }

    fn random_links(n: usize) -> Vec<RecordId> {
        (0..n).map(|_| RecordId(random_bytes::<32>())).collect()
    }

    #[test]
    fn test_marshal_unmarshal_hash_stability() {
        for k in 0..16u64 {
            let owner = test_owner();
            let rec = RecordBuilder::new(k)
                .value(random_bytes::<32>().to_vec())
                .links(random_links(3))
                .masking_key(b"test".to_vec())
                .selector(b"test0".to_vec(), b"0000".to_vec())
                .sign(&owner)
                .unwrap();

            let bytes = rec.to_bytes();
            let back = Record::from_bytes(&bytes).unwrap();
            assert_eq!(back.hash(), rec.hash());
            assert_eq!(back, rec);
        }
    }

    #[test]
    fn test_p384_owner_roundtrip() {
        let owner = Owner::generate(OwnerType::NistP384).unwrap();
        let rec = RecordBuilder::new(7)
            .value(b"value".to_vec())
            .links(random_links(2))
            .sign(&owner)
            .unwrap();
        let back = Record::from_bytes(&rec.to_bytes()).unwrap();
        assert_eq!(back.hash(), rec.hash());
        back.validate(&RecordLimits::default(), 8).unwrap();
    }

    #[test]
    fn test_value_masking_roundtrip() {
        let owner = test_owner();
        let value = b"a truthful statement".to_vec();
        let rec = RecordBuilder::new(42)
            .value(value.clone())
            .masking_key(b"maskingkey".to_vec())
            .sign(&owner)
            .unwrap();

        assert_ne!(rec.value.as_ref(), &value[..]);
        assert_eq!(rec.get_value(Some(b"maskingkey")).as_ref(), &value[..]);
        assert_ne!(rec.get_value(Some(b"not maskingkey")).as_ref(), &value[..]);
    }

    #[test]
    fn test_unmasked_value_returned_as_is() {
        let owner = test_owner();
        let rec = RecordBuilder::new(1)
            .value(b"plain".to_vec())
            .sign(&owner)
            .unwrap();
        assert_eq!(rec.get_value(None).as_ref(), b"plain");
        assert_eq!(rec.get_value(Some(b"anything")).as_ref(), b"plain");
    }

    #[test]
    fn test_validate_accepts_good_record() {
        let owner = test_owner();
        let rec = RecordBuilder::new(100)
            .value(b"v".to_vec())
            .links(random_links(3))
            .selector(b"name".to_vec(), b"0001".to_vec())
            .sign(&owner)
            .unwrap();
        rec.validate(&RecordLimits::default(), 100).unwrap();
    }

    #[test]
    fn test_validate_rejects_tampered_signature() {
        let owner = test_owner();
        let mut rec = RecordBuilder::new(100)
            .value(b"v".to_vec())
            .sign(&owner)
            .unwrap();
        rec.signature[5] ^= 1;
        assert!(matches!(
            rec.validate(&RecordLimits::default(), 100),
            Err(RecordError::BadSignature)
        ));
    }

    #[test]
    fn test_validate_rejects_tampered_value() {
        let owner = test_owner();
        let rec = RecordBuilder::new(100)
            .value(b"honest".to_vec())
            .sign(&owner)
            .unwrap();
        let mut bytes = rec.to_bytes();
        // Flip a byte somewhere in the middle (the value region).
        let mid = bytes.len() / 2;
        bytes[mid] ^= 1;
        match Record::from_bytes(&bytes) {
            Ok(tampered) => assert!(tampered.validate(&RecordLimits::default(), 100).is_err()),
            Err(_) => {}
        }
    }

    #[test]
    fn test_validate_timestamp_window() {
        let owner = test_owner();
        let rec = RecordBuilder::new(1000)
            .value(b"v".to_vec())
            .sign(&owner)
            .unwrap();

        let mut limits = RecordLimits::default();
        limits.timestamp_floor = 2000;
        assert!(matches!(
            rec.validate(&limits, 3000),
            Err(RecordError::TimestampOutOfRange { .. })
        ));

        // Too far in the future relative to `now`.
        assert!(matches!(
            rec.validate(&RecordLimits::default(), 100),
            Err(RecordError::TimestampOutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_link_minimum() {
        let owner = test_owner();
        let rec = RecordBuilder::new(5)
            .value(b"v".to_vec())
            .links(random_links(1))
            .sign(&owner)
            .unwrap();
        let mut limits = RecordLimits::default();
        limits.min_links = 3;
        assert!(matches!(
            rec.validate(&limits, 5),
            Err(RecordError::LinkCountInvalid { count: 1, min: 3 })
        ));
    }

    #[test]
    fn test_duplicate_links_rejected_at_build() {
        let owner = test_owner();
        let id = RecordId([0xaa; 32]);
        let result = RecordBuilder::new(5).link(id).link(id).sign(&owner);
        assert!(matches!(result, Err(RecordError::DuplicateLink)));
    }

    #[test]
    fn test_work_required_but_absent() {
        let owner = test_owner();
        let rec = RecordBuilder::new(5).value(b"v".to_vec()).sign(&owner).unwrap();
        let mut limits = RecordLimits::default();
        limits.work_required = true;
        assert!(matches!(
            rec.validate(&limits, 5),
            Err(RecordError::BadProofOfWork)
        ));
    }

    #[test]
    fn test_undersized_work_is_rejected() {
        // A proof at far lower difficulty than the record's cost must fail
        // validation even though the proof itself verifies.
        let owner = test_owner();
        let mut rec = RecordBuilder::new(5)
            .value(b"v".to_vec())
            .sign(&owner)
            .unwrap();
        let wg = Wharrgarblr::new(1024 * 1024, 2);
        let input = rec.serialize_until(Until::Work);
        let (proof, _) = wg.compute(&input, 1, &CancelToken::new()).unwrap();
        rec.work = Some(proof);
        let signed = rec.serialize_until(Until::Signature);
        rec.signature = owner.sign(&signed).unwrap();
        assert!(matches!(
            rec.validate(&RecordLimits::default(), 5),
            Err(RecordError::BadProofOfWork)
        ));
    }

    #[test]
    #[ignore = "runs the full-difficulty prover; slow outside release builds"]
    fn test_full_proof_of_work_record_validates() {
        let owner = test_owner();
        let wg = Wharrgarblr::new(1024 * 1024 * 32, 0);
        let rec = RecordBuilder::new(crate::time_sec())
            .value(random_bytes::<32>().to_vec())
            .links(random_links(3))
            .selector(b"full record test".to_vec(), b"0000".to_vec())
            .work_and_sign(&owner, &wg, &CancelToken::new())
            .unwrap();
        rec.validate(&RecordLimits::default(), crate::time_sec()).unwrap();
    }

    #[test]
    fn test_selector_key_index_bounds() {
        let owner = test_owner();
        let rec = RecordBuilder::new(5)
            .value(b"v".to_vec())
            .selector(b"n".to_vec(), b"o".to_vec())
            .sign(&owner)
            .unwrap();
        assert!(rec.selector_key(0).is_ok());
        assert!(rec.selector_key(1).is_err());
    }

    #[test]
    fn test_selector_key_matches_standalone_form() {
        let owner = test_owner();
        let rec = RecordBuilder::new(5)
            .value(b"v".to_vec())
            .selector(b"name".to_vec(), b"ordinal".to_vec())
            .sign(&owner)
            .unwrap();
        assert_eq!(
            rec.selector_key(0).unwrap(),
            crate::selector::make_selector_key(b"name", b"ordinal")
        );
    }

    #[test]
    fn test_truncated_record_is_corrupt() {
        let owner = test_owner();
        let rec = RecordBuilder::new(5).value(b"v".to_vec()).sign(&owner).unwrap();
        let bytes = rec.to_bytes();
        for cut in [1usize, 10, bytes.len() - 1] {
            assert!(Record::from_bytes(&bytes[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn test_unknown_version_rejected() {
        let owner = test_owner();
        let rec = RecordBuilder::new(5).value(b"v".to_vec()).sign(&owner).unwrap();
        let mut bytes = rec.to_bytes();
        bytes[0] |= 0x10;
        assert!(matches!(
            Record::from_bytes(&bytes),
            Err(RecordError::UnknownVersion(1))
        ));
    }
}
