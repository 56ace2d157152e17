//! DER(r, s) + sighash-type signature codec used inside scriptSig pushes.
//!
//! Wire layout: `0x30 <len> 0x02 <rLen> <r> 0x02 <sLen> <s> <sighashType>`.
//! Decoding is strict: every tag and length must match exactly, and the
//! buffer must end with a single `SIGHASH_ALL` byte.

use num_bigint::{BigInt, Sign};

use crate::constants::{DER_INTEGER, DER_SEQUENCE, SIGHASH_ALL};
use crate::error::{Result, TxError};
use crate::keys::{ecdsa_verify, KeyPair};
use crate::types::Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub r: BigInt,
    pub s: BigInt,
    pub sighash_type: u8,
}

impl Signature {
    pub fn new(r: BigInt, s: BigInt, sighash_type: u8) -> Self {
        Signature { r, s, sighash_type }
    }

    /// Sign `hash` with `key`, tagged `SIGHASH_ALL`
    pub fn sign(hash: &Hash, key: &KeyPair) -> Self {
        let (r, s) = key.sign(hash);
        Signature {
            r: BigInt::from_bytes_be(Sign::Plus, &r),
            s: BigInt::from_bytes_be(Sign::Plus, &s),
            sighash_type: SIGHASH_ALL,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(&self.r, &self.s, self.sighash_type)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }

    /// ECDSA-verify this signature over `hash` against a serialized public key
    pub fn verify(&self, hash: &Hash, public_key: &[u8]) -> bool {
        match (to_scalar(&self.r), to_scalar(&self.s)) {
            (Some(r), Some(s)) => ecdsa_verify(hash, public_key, &r, &s),
            _ => false,
        }
    }
}

/// Positive integer that fits the 32-byte curve scalar
fn to_scalar(value: &BigInt) -> Option<[u8; 32]> {
    let (sign, bytes) = value.to_bytes_be();
    if sign != Sign::Plus || bytes.len() > 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Some(out)
}

pub fn encode(r: &BigInt, s: &BigInt, sighash_type: u8) -> Result<Vec<u8>> {
    if r.sign() == Sign::Minus || s.sign() == Sign::Minus {
        return Err(TxError::MalformedInput(
            "signature integers must not be negative".into(),
        ));
    }
    let r_bytes = r.to_signed_bytes_be();
    let s_bytes = s.to_signed_bytes_be();
    let body_len = 2 + r_bytes.len() + 2 + s_bytes.len();
    // single-byte DER lengths only
    if body_len > 0x7f {
        return Err(TxError::MalformedInput(format!(
            "signature integers too large for DER encoding: {} bytes",
            body_len
        )));
    }

    let mut out = Vec::with_capacity(body_len + 3);
    out.push(DER_SEQUENCE);
    out.push(body_len as u8);
    out.push(DER_INTEGER);
    out.push(r_bytes.len() as u8);
    out.extend_from_slice(&r_bytes);
    out.push(DER_INTEGER);
    out.push(s_bytes.len() as u8);
    out.extend_from_slice(&s_bytes);
    out.push(sighash_type);
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<Signature> {
    let malformed = |what: &str| TxError::MalformedInput(format!("signature: {}", what));

    if bytes.len() < 3 {
        return Err(malformed("too short"));
    }
    if bytes[0] != DER_SEQUENCE {
        return Err(malformed("missing SEQUENCE tag"));
    }
    if bytes[1] as usize != bytes.len() - 3 {
        return Err(malformed("declared length does not match buffer"));
    }

    let mut pos = 2;
    let r = read_integer(bytes, &mut pos).ok_or_else(|| malformed("bad r INTEGER"))?;
    let s = read_integer(bytes, &mut pos).ok_or_else(|| malformed("bad s INTEGER"))?;

    if pos + 1 != bytes.len() {
        return Err(malformed("unexpected bytes after s"));
    }
    let sighash_type = bytes[pos];
    if sighash_type != SIGHASH_ALL {
        return Err(TxError::SignatureInvalid(format!(
            "unsupported sighash type {:#04x}",
            sighash_type
        )));
    }

    Ok(Signature { r, s, sighash_type })
}

// INTEGER tag, length, value; must leave room for the trailing sighash byte.
// The value must be a minimally encoded, non-negative integer.
fn read_integer(bytes: &[u8], pos: &mut usize) -> Option<BigInt> {
    let body_end = bytes.len() - 1;
    if *pos + 2 > body_end || bytes[*pos] != DER_INTEGER {
        return None;
    }
    let len = bytes[*pos + 1] as usize;
    let start = *pos + 2;
    if len == 0 || start + len > body_end {
        return None;
    }
    let value = &bytes[start..start + len];
    if value[0] & 0x80 != 0 {
        return None;
    }
    if len > 1 && value[0] == 0x00 && value[1] & 0x80 == 0 {
        return None;
    }
    *pos = start + len;
    Some(BigInt::from_signed_bytes_be(value))
}
