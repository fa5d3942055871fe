//! Generic ECDSA over short-Weierstrass prime curves.
//!
//! Two curves are supported: standard NIST P-384 for record owners, and the
//! twisted Brainpool curve BrainpoolP160T1 (RFC 5639) whose small signatures
//! back selector claims. The Brainpool parameters are fixed constants and
//! must never change: selector keys and claim recovery depend on them.
//!
//! Signatures are deterministic (HMAC-SHA512 nonce derivation from the
//! private scalar and message digest) and can optionally embed a recovery
//! index, allowing [`recover`] to reconstruct the signer's public key from
//! the message and signature alone.
//!
//! Arithmetic is plain affine big-integer math. Nothing here is
//! constant-time; selector claim keys are derived from public names and
//! owner keys sign public data, so timing is not load-bearing.

use hmac::{Hmac, Mac};
use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Zero};
use once_cell::sync::Lazy;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;

use crate::error::CryptoError;

/// Identifies one of the two supported curves.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Curve {
    /// NIST P-384 (secp384r1). 48-byte field elements.
    NistP384,
    /// BrainpoolP160T1 (RFC 5639, twisted). 20-byte field elements.
    BrainpoolP160T1,
}

/// Domain parameters for a short-Weierstrass curve y^2 = x^3 + ax + b over F_p.
pub struct CurveParams {
    pub name: &'static str,
    pub p: BigUint,
    pub a: BigUint,
    pub b: BigUint,
    pub gx: BigUint,
    pub gy: BigUint,
    pub n: BigUint,
    /// Byte width of a field element (and of a scalar; both primes match in size).
    pub field_bytes: usize,
}

fn hx(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 16).expect("curve constant")
}

static P384: Lazy<CurveParams> = Lazy::new(|| CurveParams {
    name: "NIST P-384",
    p: hx("fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffeffffffff0000000000000000ffffffff"),
    a: hx("fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffeffffffff0000000000000000fffffffc"),
    b: hx("b3312fa7e23ee7e4988e056be3f82d19181d9c6efe8141120314088f5013875ac656398d8a2ed19d2a85c8edd3ec2aef"),
    gx: hx("aa87ca22be8b05378eb1c71ef320ad746e1d3b628ba79b9859f741e082542a385502f25dbf55296c3a545e3872760ab7"),
    gy: hx("3617de4a96262c6f5d9e98bf9292dc29f8f41dbd289a147ce9da3113b5f0b8c00a60b1ce1d7e819d7a431d7c90ea0e5f"),
    n: hx("ffffffffffffffffffffffffffffffffffffffffffffffffc7634d81f4372ddf581a0db248b0a77aecec196accc52973"),
    field_bytes: 48,
});

static BRAINPOOL_P160T1: Lazy<CurveParams> = Lazy::new(|| CurveParams {
    name: "BrainpoolP160T1",
    p: hx("e95e4a5f737059dc60dfc7ad95b3d8139515620f"),
    a: hx("e95e4a5f737059dc60dfc7ad95b3d8139515620c"),
    b: hx("7a556b6dae535b7b51ed2c4d7daa7a0b5c55f380"),
    gx: hx("b199b13b9b34efc1397e64baeb05acc265ff2378"),
    gy: hx("add6718b7c7c1961f0991b842443772152c9e0ad"),
    n: hx("e95e4a5f737059dc60df5991d45029409e60fc09"),
    field_bytes: 20,
});

impl Curve {
    /// The curve's domain parameters.
    pub fn params(self) -> &'static CurveParams {
        match self {
            Curve::NistP384 => &P384,
            Curve::BrainpoolP160T1 => &BRAINPOOL_P160T1,
        }
    }

    /// Length in bytes of a compressed public key on this curve.
    pub fn compressed_len(self) -> usize {
        self.params().field_bytes + 1
    }

    /// Length in bytes of a plain `r || s` signature on this curve.
    pub fn signature_len(self) -> usize {
        self.params().field_bytes * 2
    }

    /// Length in bytes of a signature with an embedded recovery index.
    pub fn recoverable_signature_len(self) -> usize {
        self.signature_len() + 1
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Field and point arithmetic
// ─────────────────────────────────────────────────────────────────────────

/// An affine point; `None` is the point at infinity.
type Point = Option<(BigUint, BigUint)>;

fn mod_inv(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let a = BigInt::from(a.clone());
    let m = BigInt::from(m.clone());
    let e = a.extended_gcd(&m);
    if !e.gcd.is_one() {
        return None;
    }
    e.x.mod_floor(&m).to_biguint()
}

fn mod_sub(a: &BigUint, b: &BigUint, m: &BigUint) -> BigUint {
    ((a + m) - (b % m)) % m
}

fn point_double(cp: &CurveParams, pt: &Point) -> Point {
    let (x, y) = pt.as_ref()?;
    if y.is_zero() {
        return None;
    }
    // lambda = (3x^2 + a) / 2y
    let num = (x * x * 3u32 + &cp.a) % &cp.p;
    let den = mod_inv(&((y * 2u32) % &cp.p), &cp.p)?;
    let l = (num * den) % &cp.p;
    let x3 = mod_sub(&((&l * &l) % &cp.p), &((x * 2u32) % &cp.p), &cp.p);
    let y3 = mod_sub(&((&l * mod_sub(x, &x3, &cp.p)) % &cp.p), y, &cp.p);
    Some((x3, y3))
}

fn point_add(cp: &CurveParams, p1: &Point, p2: &Point) -> Point {
    let (x1, y1) = match p1 {
        Some(v) => v,
        None => return p2.clone(),
    };
    let (x2, y2) = match p2 {
        Some(v) => v,
        None => return p1.clone(),
    };
    if x1 == x2 {
        if y1 == y2 {
            return point_double(cp, p1);
        }
        return None; // P + (-P)
    }
    // lambda = (y2 - y1) / (x2 - x1)
    let num = mod_sub(y2, y1, &cp.p);
    let den = mod_inv(&mod_sub(x2, x1, &cp.p), &cp.p)?;
    let l = (num * den) % &cp.p;
    let x3 = mod_sub(&mod_sub(&((&l * &l) % &cp.p), x1, &cp.p), x2, &cp.p);
    let y3 = mod_sub(&((&l * mod_sub(x1, &x3, &cp.p)) % &cp.p), y1, &cp.p);
    Some((x3, y3))
}

fn point_neg(cp: &CurveParams, pt: &Point) -> Point {
    let (x, y) = pt.as_ref()?;
    Some((x.clone(), mod_sub(&BigUint::zero(), y, &cp.p)))
}

fn scalar_mul(cp: &CurveParams, k: &BigUint, pt: &Point) -> Point {
    let mut acc: Point = None;
    let mut addend = pt.clone();
    for i in 0..k.bits() {
        if k.bit(i) {
            acc = point_add(cp, &acc, &addend);
        }
        addend = point_double(cp, &addend);
    }
    acc
}

fn base_mul(cp: &CurveParams, k: &BigUint) -> Point {
    scalar_mul(cp, k, &Some((cp.gx.clone(), cp.gy.clone())))
}

fn on_curve(cp: &CurveParams, x: &BigUint, y: &BigUint) -> bool {
    if x >= &cp.p || y >= &cp.p {
        return false;
    }
    let lhs = (y * y) % &cp.p;
    let rhs = (x * x * x + &cp.a * x + &cp.b) % &cp.p;
    lhs == rhs
}

/// Square root mod p for p ≡ 3 (mod 4), which holds for both curve primes.
fn mod_sqrt(cp: &CurveParams, v: &BigUint) -> Option<BigUint> {
    let exp = (&cp.p + 1u32) >> 2u32;
    let r = v.modpow(&exp, &cp.p);
    if (&r * &r) % &cp.p == v % &cp.p {
        Some(r)
    } else {
        None
    }
}

fn pad_be(v: &BigUint, width: usize) -> Vec<u8> {
    let raw = v.to_bytes_be();
    let mut out = vec![0u8; width];
    out[width - raw.len()..].copy_from_slice(&raw);
    out
}

/// Message digest reduced to the curve's bit width (leftmost bits of SHA-256).
fn hash_to_scalar(cp: &CurveParams, msg: &[u8]) -> BigUint {
    let digest = Sha256::digest(msg);
    let mut e = BigUint::from_bytes_be(&digest);
    let nbits = cp.n.bits();
    if nbits < 256 {
        e >>= 256 - nbits as usize;
    }
    e
}

// ─────────────────────────────────────────────────────────────────────────
// Keys
// ─────────────────────────────────────────────────────────────────────────

/// A public key on one of the supported curves.
#[derive(Clone, PartialEq, Eq)]
pub struct EccPublicKey {
    curve: Curve,
    x: BigUint,
    y: BigUint,
}

impl EccPublicKey {
    /// The curve this key lives on.
    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// Compressed encoding: `02|03` parity tag followed by the padded X coordinate.
    pub fn to_compressed(&self) -> Vec<u8> {
        let cp = self.curve.params();
        let mut out = Vec::with_capacity(cp.field_bytes + 1);
        out.push(if self.y.bit(0) { 0x03 } else { 0x02 });
        out.extend_from_slice(&pad_be(&self.x, cp.field_bytes));
        out
    }

    /// Decode a compressed public key.
    pub fn from_compressed(curve: Curve, bytes: &[u8]) -> Result<Self, CryptoError> {
        let cp = curve.params();
        if bytes.len() != cp.field_bytes + 1 || (bytes[0] != 0x02 && bytes[0] != 0x03) {
            return Err(CryptoError::Decompress);
        }
        let x = BigUint::from_bytes_be(&bytes[1..]);
        if x >= cp.p {
            return Err(CryptoError::Decompress);
        }
        let v = (&x * &x * &x + &cp.a * &x + &cp.b) % &cp.p;
        let mut y = mod_sqrt(cp, &v).ok_or(CryptoError::Decompress)?;
        if y.bit(0) != (bytes[0] == 0x03) {
            y = mod_sub(&BigUint::zero(), &y, &cp.p);
        }
        Ok(Self { curve, x, y })
    }

    /// Verify a plain `r || s` signature over `msg`.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> bool {
        let cp = self.curve.params();
        if sig.len() != cp.field_bytes * 2 {
            return false;
        }
        let r = BigUint::from_bytes_be(&sig[..cp.field_bytes]);
        let s = BigUint::from_bytes_be(&sig[cp.field_bytes..]);
        if r.is_zero() || s.is_zero() || r >= cp.n || s >= cp.n {
            return false;
        }
        let e = hash_to_scalar(cp, msg);
        let w = match mod_inv(&s, &cp.n) {
            Some(w) => w,
            None => return false,
        };
        let u1 = (&e * &w) % &cp.n;
        let u2 = (&r * &w) % &cp.n;
        let pt = point_add(
            cp,
            &base_mul(cp, &u1),
            &scalar_mul(cp, &u2, &Some((self.x.clone(), self.y.clone()))),
        );
        match pt {
            Some((px, _)) => px % &cp.n == r,
            None => false,
        }
    }
}

impl fmt::Debug for EccPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EccPublicKey({}, {})",
            self.curve.params().name,
            &hex::encode(self.to_compressed())[..16]
        )
    }
}

/// A signing keypair.
#[derive(Clone)]
pub struct EccKeyPair {
    public: EccPublicKey,
    d: BigUint,
}

impl EccKeyPair {
    /// Generate a random keypair on `curve`.
    pub fn generate(curve: Curve) -> Result<Self, CryptoError> {
        let cp = curve.params();
        let mut buf = vec![0u8; cp.field_bytes + 8];
        rand::thread_rng().fill_bytes(&mut buf);
        Self::from_scalar_bytes(curve, &buf)
    }

    /// Derive a keypair deterministically from arbitrary bytes.
    ///
    /// The bytes are reduced into `[1, n-1]`; the same input always yields
    /// the same keypair. Callers are expected to pass uniformly distributed
    /// input (a hash expansion of a seed or name).
    pub fn from_scalar_bytes(curve: Curve, bytes: &[u8]) -> Result<Self, CryptoError> {
        let cp = curve.params();
        let n1 = &cp.n - 1u32;
        let d = BigUint::from_bytes_be(bytes) % &n1 + 1u32;
        let (x, y) = base_mul(cp, &d).ok_or(CryptoError::Generate)?;
        Ok(Self {
            public: EccPublicKey { curve, x, y },
            d,
        })
    }

    /// The public half.
    pub fn public(&self) -> &EccPublicKey {
        &self.public
    }

    /// Deterministic nonce for `e`, derived with HMAC-SHA512 keyed by the scalar.
    fn nonce(&self, cp: &CurveParams, e: &BigUint, ctr: u8) -> BigUint {
        let mut mac = Hmac::<Sha512>::new_from_slice(&pad_be(&self.d, cp.field_bytes))
            .expect("hmac accepts any key length");
        mac.update(&pad_be(e, cp.field_bytes.max(32)));
        mac.update(&[ctr]);
        let out = mac.finalize().into_bytes();
        BigUint::from_bytes_be(&out) % (&cp.n - 1u32) + 1u32
    }

    fn sign_inner(&self, msg: &[u8]) -> Result<(BigUint, BigUint, u8), CryptoError> {
        let cp = self.public.curve.params();
        let e = hash_to_scalar(cp, msg);
        for ctr in 0..=255u8 {
            let k = self.nonce(cp, &e, ctr);
            let (rx, ry) = match base_mul(cp, &k) {
                Some(pt) => pt,
                None => continue,
            };
            let r = &rx % &cp.n;
            if r.is_zero() {
                continue;
            }
            let kinv = match mod_inv(&k, &cp.n) {
                Some(v) => v,
                None => continue,
            };
            let s = (kinv * (&e + &r * &self.d)) % &cp.n;
            if s.is_zero() {
                continue;
            }
            let mut recid = if ry.bit(0) { 1u8 } else { 0u8 };
            if rx >= cp.n {
                recid |= 2;
            }
            return Ok((r, s, recid));
        }
        Err(CryptoError::Sign)
    }

    /// Sign `msg`, producing a fixed-width `r || s` signature.
    pub fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cp = self.public.curve.params();
        let (r, s, _) = self.sign_inner(msg)?;
        let mut out = pad_be(&r, cp.field_bytes);
        out.extend_from_slice(&pad_be(&s, cp.field_bytes));
        Ok(out)
    }

    /// Sign `msg`, appending a one-byte recovery index so [`recover`] can
    /// reconstruct the public key.
    pub fn sign_recoverable(&self, msg: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cp = self.public.curve.params();
        let (r, s, recid) = self.sign_inner(msg)?;
        let mut out = pad_be(&r, cp.field_bytes);
        out.extend_from_slice(&pad_be(&s, cp.field_bytes));
        out.push(recid);
        Ok(out)
    }
}

impl fmt::Debug for EccKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EccKeyPair({:?})", self.public)
    }
}

/// Recover the signer's public key from a recovery-embedding signature.
///
/// Succeeds for every signature produced by [`EccKeyPair::sign_recoverable`]
/// and is deterministic: the same `(msg, sig)` always yields the same key.
pub fn recover(curve: Curve, msg: &[u8], sig: &[u8]) -> Result<EccPublicKey, CryptoError> {
    let cp = curve.params();
    if sig.len() != cp.field_bytes * 2 + 1 {
        return Err(CryptoError::Recover);
    }
    let r = BigUint::from_bytes_be(&sig[..cp.field_bytes]);
    let s = BigUint::from_bytes_be(&sig[cp.field_bytes..cp.field_bytes * 2]);
    let recid = sig[cp.field_bytes * 2];
    if recid > 3 || r.is_zero() || s.is_zero() || r >= cp.n || s >= cp.n {
        return Err(CryptoError::Recover);
    }

    let mut x = r.clone();
    if recid & 2 != 0 {
        x += &cp.n;
    }
    if x >= cp.p {
        return Err(CryptoError::Recover);
    }
    let v = (&x * &x * &x + &cp.a * &x + &cp.b) % &cp.p;
    let mut y = mod_sqrt(cp, &v).ok_or(CryptoError::Recover)?;
    if y.bit(0) != (recid & 1 == 1) {
        y = mod_sub(&BigUint::zero(), &y, &cp.p);
    }
    if !on_curve(cp, &x, &y) {
        return Err(CryptoError::Recover);
    }

    // Q = r^-1 (s*R - e*G)
    let e = hash_to_scalar(cp, msg) % &cp.n;
    let rinv = mod_inv(&r, &cp.n).ok_or(CryptoError::Recover)?;
    let sr = scalar_mul(cp, &s, &Some((x, y)));
    let eg = base_mul(cp, &e);
    let diff = point_add(cp, &sr, &point_neg(cp, &eg));
    let q = scalar_mul(cp, &rinv, &diff);
    match q {
        Some((qx, qy)) => Ok(EccPublicKey {
            curve,
            x: qx,
            y: qy,
        }),
        None => Err(CryptoError::Recover),
    }
}
