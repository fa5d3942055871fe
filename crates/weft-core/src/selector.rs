//! Selectors: owner-blind index claims.
//!
//! A selector binds a (name, ordinal) pair to one specific record without
//! revealing the name. The claim is a recovery-embedding ECDSA signature on
//! the 160-bit Brainpool curve, made by a keypair derived deterministically
//! from the name and signing the record's body hash. Anyone can recover the
//! claim public key from the signature and derive the 32-byte selector key;
//! only someone who knows the name can produce a claim that lands in that
//! name's key space.
//!
//! Selector keys order by (name bucket, ordinal): the ordinal is added to
//! the name-derived base hash as a big-endian integer, so for a fixed name,
//! equal-width ascending ordinals produce strictly ascending keys and range
//! scans walk a logical series in order.

use sha2::{Digest, Sha512};

use crate::ecc::{recover, Curve, EccKeyPair};
use crate::error::RecordError;
use crate::hash::shandwich256;
use crate::wire::{put_uvarint, Reader};

/// Size of a selector claim: a BrainpoolP160T1 signature with its recovery index.
pub const SELECTOR_CLAIM_SIZE: usize = 41;

/// Sanity cap on ordinal length.
pub const SELECTOR_MAX_ORDINAL_SIZE: usize = 256;

/// A selector as it appears in a record.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Selector {
    /// Caller-supplied ordinal, compared lexicographically within a name.
    pub ordinal: Vec<u8>,
    /// Recoverable claim signature over the record's body hash.
    pub claim: [u8; SELECTOR_CLAIM_SIZE],
}

/// The deterministic claim keypair for a selector name.
fn claim_keypair(name: &[u8]) -> EccKeyPair {
    let scalar = Sha512::digest(name);
    EccKeyPair::from_scalar_bytes(Curve::BrainpoolP160T1, &scalar)
        .expect("curve generator is valid")
}

/// Add `ordinal`, interpreted as a big-endian integer, into the low end of a
/// 32-byte key.
fn add_ordinal(key: &mut [u8; 32], ordinal: &[u8]) {
    let ordinal = if ordinal.len() > 32 {
        &ordinal[ordinal.len() - 32..]
    } else {
        ordinal
    };
    let mut carry = 0u16;
    let mut ki = 31usize;
    for oi in (0..ordinal.len()).rev() {
        let sum = key[ki] as u16 + ordinal[oi] as u16 + carry;
        key[ki] = sum as u8;
        carry = sum >> 8;
        if ki == 0 {
            return;
        }
        ki -= 1;
    }
    while carry != 0 {
        let sum = key[ki] as u16 + carry;
        key[ki] = sum as u8;
        carry = sum >> 8;
        if ki == 0 {
            return;
        }
        ki -= 1;
    }
}

fn key_from_claim_public(compressed: &[u8], ordinal: &[u8]) -> [u8; 32] {
    let mut key = shandwich256(compressed);
    add_ordinal(&mut key, ordinal);
    key
}

impl Selector {
    /// Build the selector for `(name, ordinal)` claiming the record whose
    /// body hash is `claim_hash`.
    pub fn set(name: &[u8], ordinal: &[u8], claim_hash: &[u8; 32]) -> Self {
        let pair = claim_keypair(name);
        let sig = pair
            .sign_recoverable(claim_hash)
            .expect("deterministic signer cannot fail");
        let mut claim = [0u8; SELECTOR_CLAIM_SIZE];
        claim.copy_from_slice(&sig);
        Self {
            ordinal: ordinal.to_vec(),
            claim,
        }
    }

    /// Derive the 32-byte index key, given the record body hash the claim
    /// was made over.
    ///
    /// Byte-equal to [`make_selector_key`] for the matching `(name, ordinal)`.
    pub fn key(&self, claim_hash: &[u8; 32]) -> Result<[u8; 32], RecordError> {
        let public = recover(Curve::BrainpoolP160T1, claim_hash, &self.claim)
            .map_err(|_| RecordError::SelectorInvalid { index: 0 })?;
        Ok(key_from_claim_public(&public.to_compressed(), &self.ordinal))
    }

    /// Canonical wire bytes: varint ordinal length, ordinal, claim.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        put_uvarint(buf, self.ordinal.len() as u64);
        buf.extend_from_slice(&self.ordinal);
        buf.extend_from_slice(&self.claim);
    }

    /// Canonical wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2 + self.ordinal.len() + SELECTOR_CLAIM_SIZE);
        self.write_to(&mut buf);
        buf
    }

    /// Decode from a wire cursor.
    pub fn read_from(r: &mut Reader<'_>) -> Result<Self, RecordError> {
        let ordinal = r
            .var_bytes(SELECTOR_MAX_ORDINAL_SIZE, "selector ordinal")?
            .to_vec();
        let claim = r.array::<SELECTOR_CLAIM_SIZE>("selector claim")?;
        Ok(Self { ordinal, claim })
    }

    /// Decode from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        let mut r = Reader::new(bytes);
        let sel = Self::read_from(&mut r)?;
        if r.remaining() != 0 {
            return Err(RecordError::Corrupt("selector trailing bytes"));
        }
        Ok(sel)
    }
}

/// Compute the selector key for `(name, ordinal)` directly from the name.
///
/// This is the query-side form: it needs the plaintext name and no claim.
pub fn make_selector_key(name: &[u8], ordinal: &[u8]) -> [u8; 32] {
    let pair = claim_keypair(name);
    key_from_claim_public(&pair.public().to_compressed(), ordinal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_wire_roundtrip() {
        let hash = [0x5a; 32];
        let sel = Selector::set(b"name", b"0000000000000007", &hash);
        let back = Selector::from_bytes(&sel.to_bytes()).unwrap();
        assert_eq!(back.ordinal, sel.ordinal);
        assert_eq!(back.claim, sel.claim);
    }

    #[test]
    fn test_key_agrees_with_make_selector_key() {
        let hash = [0x11; 32];
        let sel = Selector::set(b"name", b"ord", &hash);
        assert_eq!(sel.key(&hash).unwrap(), make_selector_key(b"name", b"ord"));
    }

    #[test]
    fn test_ascending_ordinals_give_strictly_ascending_keys() {
        let hash = [0x33; 32];
        let mut prev: Option<[u8; 32]> = None;
        for k in 0..256u32 {
            let ordinal = format!("{:016x}", k);
            let sel = Selector::set(b"name", ordinal.as_bytes(), &hash);
            let key = sel.key(&hash).unwrap();
            if let Some(p) = prev {
                assert!(p < key, "ordinal {k} did not sort above its predecessor");
            }
            prev = Some(key);
        }
    }

    #[test]
    fn test_different_names_land_in_different_buckets() {
        let a = make_selector_key(b"alpha", b"0000");
        let b = make_selector_key(b"beta", b"0000");
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_is_stable_across_claim_hashes() {
        // The key depends on the name (via recovery) and ordinal only.
        let h1 = [0x01; 32];
        let h2 = [0x02; 32];
        let s1 = Selector::set(b"name", b"ord", &h1);
        let s2 = Selector::set(b"name", b"ord", &h2);
        assert_eq!(s1.key(&h1).unwrap(), s2.key(&h2).unwrap());
    }

    #[test]
    fn test_mangled_claim_changes_or_rejects_key() {
        let hash = [0x44; 32];
        let sel = Selector::set(b"name", b"ord", &hash);
        let good = sel.key(&hash).unwrap();
        let mut bad = sel.clone();
        bad.claim[3] ^= 1;
        match bad.key(&hash) {
            Ok(k) => assert_ne!(k, good),
            Err(_) => {}
        }
    }
}
