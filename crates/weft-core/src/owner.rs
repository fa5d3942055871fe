//! Record owners: the keypairs that sign records.
//!
//! An owner is identified on the wire by a one-byte type tag followed by its
//! public key bytes. Two families are supported: Ed25519 (32-byte public
//! keys, 64-byte signatures) and NIST P-384 with compressed points (49-byte
//! public keys, 96-byte signatures).
//!
//! Owners can be derived deterministically from a seed: the seed is expanded
//! with HKDF-SHA512 into the key domain of the chosen family, so the same
//! seed always produces the same owner.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha512;
use std::fmt;
use zeroize::Zeroizing;

use crate::ecc::{Curve, EccKeyPair, EccPublicKey};
use crate::error::{CryptoError, RecordError};

/// One-byte owner type tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum OwnerType {
    /// Ed25519; 32-byte public key.
    Ed25519 = 1,
    /// NIST P-384 with compressed public keys; 49 bytes.
    NistP384 = 2,
}

impl OwnerType {
    /// Parse the wire tag.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Ed25519),
            2 => Some(Self::NistP384),
            _ => None,
        }
    }

    /// The wire tag.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Public key length in bytes for this type.
    pub fn public_len(self) -> usize {
        match self {
            Self::Ed25519 => 32,
            Self::NistP384 => Curve::NistP384.compressed_len(),
        }
    }

    /// Signature length in bytes for this type.
    pub fn signature_len(self) -> usize {
        match self {
            Self::Ed25519 => 64,
            Self::NistP384 => Curve::NistP384.signature_len(),
        }
    }
}

/// The public half of an owner.
#[derive(Clone, PartialEq, Eq)]
pub enum OwnerPublic {
    Ed25519([u8; 32]),
    NistP384(EccPublicKey),
}

impl OwnerPublic {
    /// The owner's type tag.
    pub fn owner_type(&self) -> OwnerType {
        match self {
            Self::Ed25519(_) => OwnerType::Ed25519,
            Self::NistP384(_) => OwnerType::NistP384,
        }
    }

    /// The wire public key bytes (no tag).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Ed25519(pk) => pk.to_vec(),
            Self::NistP384(pk) => pk.to_compressed(),
        }
    }

    /// Decode public key bytes for a known type tag.
    pub fn from_bytes(owner_type: OwnerType, bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() != owner_type.public_len() {
            return Err(RecordError::Corrupt("owner public key length"));
        }
        match owner_type {
            OwnerType::Ed25519 => {
                let mut pk = [0u8; 32];
                pk.copy_from_slice(bytes);
                Ok(Self::Ed25519(pk))
            }
            OwnerType::NistP384 => Ok(Self::NistP384(EccPublicKey::from_compressed(
                Curve::NistP384,
                bytes,
            )?)),
        }
    }

    /// Verify a signature over `msg`.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> Result<(), RecordError> {
        let ok = match self {
            Self::Ed25519(pk) => {
                let key = VerifyingKey::from_bytes(pk).map_err(|_| CryptoError::Verify)?;
                let sig: &[u8; 64] = sig
                    .try_into()
                    .map_err(|_| RecordError::Corrupt("signature length"))?;
                key.verify(msg, &ed25519_dalek::Signature::from_bytes(sig))
                    .is_ok()
            }
            Self::NistP384(pk) => pk.verify(msg, sig),
        };
        if ok {
            Ok(())
        } else {
            Err(RecordError::BadSignature)
        }
    }

    /// Hex of the public key bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Debug for OwnerPublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerPublic({:?}, {})", self.owner_type(), &self.to_hex()[..16])
    }
}

enum OwnerSecret {
    Ed25519(SigningKey),
    NistP384(EccKeyPair),
}

/// A complete owner keypair, able to sign records.
pub struct Owner {
    public: OwnerPublic,
    secret: OwnerSecret,
}

impl Owner {
    /// Generate a new random owner of the given type.
    pub fn generate(owner_type: OwnerType) -> Result<Self, CryptoError> {
        match owner_type {
            OwnerType::Ed25519 => {
                let mut rng = rand::thread_rng();
                let signing = SigningKey::generate(&mut rng);
                Ok(Self {
                    public: OwnerPublic::Ed25519(signing.verifying_key().to_bytes()),
                    secret: OwnerSecret::Ed25519(signing),
                })
            }
            OwnerType::NistP384 => {
                let pair = EccKeyPair::generate(Curve::NistP384)?;
                Ok(Self {
                    public: OwnerPublic::NistP384(pair.public().clone()),
                    secret: OwnerSecret::NistP384(pair),
                })
            }
        }
    }

    /// Derive an owner deterministically from a seed.
    pub fn from_seed(owner_type: OwnerType, seed: &[u8]) -> Result<Self, CryptoError> {
        let hk = Hkdf::<Sha512>::new(None, seed);
        match owner_type {
            OwnerType::Ed25519 => {
                let mut key = Zeroizing::new([0u8; 32]);
                hk.expand(b"weft owner ed25519", &mut key[..])
                    .map_err(|_| CryptoError::Generate)?;
                let signing = SigningKey::from_bytes(&key);
                Ok(Self {
                    public: OwnerPublic::Ed25519(signing.verifying_key().to_bytes()),
                    secret: OwnerSecret::Ed25519(signing),
                })
            }
            OwnerType::NistP384 => {
                let mut scalar = Zeroizing::new([0u8; 64]);
                hk.expand(b"weft owner p384", &mut scalar[..])
                    .map_err(|_| CryptoError::Generate)?;
                let pair = EccKeyPair::from_scalar_bytes(Curve::NistP384, &scalar[..])?;
                Ok(Self {
                    public: OwnerPublic::NistP384(pair.public().clone()),
                    secret: OwnerSecret::NistP384(pair),
                })
            }
        }
    }

    /// The owner's type tag.
    pub fn owner_type(&self) -> OwnerType {
        self.public.owner_type()
    }

    /// The public half.
    pub fn public(&self) -> &OwnerPublic {
        &self.public
    }

    /// Sign a message.
    pub fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match &self.secret {
            OwnerSecret::Ed25519(key) => Ok(key.sign(msg).to_bytes().to_vec()),
            OwnerSecret::NistP384(pair) => pair.sign(msg),
        }
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Owner({:?})", self.public)
    }
}

/// Fill a buffer with random bytes. Small convenience used by tests and
/// the genesis tooling.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    rand::thread_rng().fill_bytes(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: [OwnerType; 2] = [OwnerType::Ed25519, OwnerType::NistP384];

    #[test]
    fn test_sign_verify_roundtrip() {
        for ty in TYPES {
            let owner = Owner::generate(ty).unwrap();
            let msg = b"record bytes";
            let sig = owner.sign(msg).unwrap();
            assert_eq!(sig.len(), ty.signature_len());
            owner.public().verify(msg, &sig).unwrap();
            assert!(owner.public().verify(b"other bytes", &sig).is_err());
        }
    }

    #[test]
    fn test_from_seed_is_deterministic() {
        for ty in TYPES {
            let a = Owner::from_seed(ty, b"lol").unwrap();
            let b = Owner::from_seed(ty, b"lol").unwrap();
            let c = Owner::from_seed(ty, b"rofl").unwrap();
            assert_eq!(a.public().to_bytes(), b.public().to_bytes());
            assert_ne!(a.public().to_bytes(), c.public().to_bytes());
        }
    }

    #[test]
    fn test_public_key_widths() {
        assert_eq!(
            Owner::from_seed(OwnerType::Ed25519, b"lol")
                .unwrap()
                .public()
                .to_bytes()
                .len(),
            32
        );
        assert_eq!(
            Owner::from_seed(OwnerType::NistP384, b"lol")
                .unwrap()
                .public()
                .to_bytes()
                .len(),
            49
        );
    }

    #[test]
    fn test_public_roundtrip_through_wire_bytes() {
        for ty in TYPES {
            let owner = Owner::generate(ty).unwrap();
            let bytes = owner.public().to_bytes();
            let back = OwnerPublic::from_bytes(ty, &bytes).unwrap();
            assert_eq!(&back, owner.public());
        }
    }

    #[test]
    fn test_unknown_owner_type_tag() {
        assert_eq!(OwnerType::from_u8(0), None);
        assert_eq!(OwnerType::from_u8(9), None);
        assert_eq!(OwnerType::from_u8(1), Some(OwnerType::Ed25519));
        assert_eq!(OwnerType::from_u8(2), Some(OwnerType::NistP384));
    }
}
